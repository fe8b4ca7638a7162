//! Session export as JSON lines.
//!
//! One object per line, tagged by `kind` so a consumer can stream-filter
//! without buffering the whole session.

use std::io::{self, Write};

use serde::Serialize;

use crate::events::LogEvent;
use crate::shield::ShieldSnapshot;
use crate::tabs::TabSnapshot;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Log {
        clock: String,
        #[serde(flatten)]
        event: &'a LogEvent,
    },
    Tab(&'a TabSnapshot),
    Summary {
        ads_blocked: u64,
        trackers_blocked: u64,
        cryptojacking_blocked: u64,
        stealth_mode: bool,
        platform: Option<&'static str>,
    },
}

fn write_record<W: Write>(out: &mut W, record: &Record<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record).map_err(io::Error::other)?;
    out.write_all(b"\n")
}

/// Writes one line per event, in the order given.
pub fn write_log_records<'a, W, I>(out: &mut W, logs: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a LogEvent>,
{
    let mut count = 0;
    for event in logs {
        write_record(
            out,
            &Record::Log {
                clock: event.clock_label(),
                event,
            },
        )?;
        count += 1;
    }
    Ok(count)
}

pub fn write_tab_records<'a, W, I>(out: &mut W, tabs: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a TabSnapshot>,
{
    let mut count = 0;
    for tab in tabs {
        write_record(out, &Record::Tab(tab))?;
        count += 1;
    }
    Ok(count)
}

/// Summary line, then logs (newest first), then tabs.
pub fn write_session<W: Write>(out: &mut W, shield: &ShieldSnapshot, tabs: &[TabSnapshot]) -> io::Result<()> {
    write_record(
        out,
        &Record::Summary {
            ads_blocked: shield.ads_blocked,
            trackers_blocked: shield.trackers_blocked,
            cryptojacking_blocked: shield.cryptojacking_blocked,
            stealth_mode: shield.stealth_mode,
            platform: shield.current_identity.as_ref().map(|i| i.platform),
        },
    )?;
    write_log_records(out, &shield.logs)?;
    write_tab_records(out, tabs)?;
    out.flush()
}
