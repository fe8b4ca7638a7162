//! # Sanda — cœur d'un navigateur privacy-first
//!
//! Classification des requêtes sortantes, usurpation d'identité et gestion
//! du cycle de vie des onglets (gel, réveil, crash, PiP). Aucun rendu :
//! ce crate est le cœur que l'interface interroge.
//!
//! ## Architecture des modules
//!
//! - [`bloom`] : Filtre de Bloom à k hachages, sans faux négatifs.
//!
//! - [`patterns`] : Liste ordonnée des motifs bloqués (intégrés + fichiers
//!   `resources/patterns/*.txt` + config).
//!
//! - [`identity`] : Profils navigateur usurpés et tirage aléatoire.
//!
//! - [`classifier`] : Verdict par requête (média, mineur, traqueur, inconnu)
//!   et l'événement de journal associé.
//!
//! - [`events`] : `LogEvent` horodaté, relayé vers `tracing`.
//!
//! - [`shield`] : Session du shield : compteurs, journal circulaire de
//!   20 entrées, niveau de menace, mode furtif.
//!
//! - [`tabs`] / [`lifecycle`] : Onglets, espaces de travail et la machine
//!   d'états Loading / Idle / Frozen / Crashed.
//!
//! - [`browser`] : Coordinateur tokio : latence du pont, délais de
//!   stabilisation, ticker de gel.
//!
//! - [`config`] : Configuration TOML persistante.
//!
//! - [`export`] : Export JSON-lines de la session.

pub mod bloom;
pub mod browser;
pub mod classifier;
pub mod config;
pub mod events;
pub mod export;
pub mod identity;
pub mod lifecycle;
pub mod patterns;
pub mod shield;
pub mod tabs;
