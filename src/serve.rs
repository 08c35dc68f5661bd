//! JSON-lines host loop: one request object per input line, one envelope per output line.
//!
//! Each request runs on its own thread so a long compile never blocks a status poll.
//! Responses are written whole under a mutex and may arrive out of order; callers
//! correlate them with the echoed `id`. On EOF the loop waits for in-flight requests
//! and then stops every managed network.
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use serde_json::Value;

use crate::bridge::{Bridge, Envelope};
use crate::errors::PanelError;
use crate::lifecycle::lock_or_recover;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeStats {
    pub requests: usize,
    pub rejected: usize,
}

pub fn serve<R, W>(bridge: &Bridge, mut input: R, output: W) -> io::Result<ServeStats>
where
    R: BufRead,
    W: Write + Send,
{
    let output = Mutex::new(output);
    let mut stats = ServeStats::default();
    let read_result = std::thread::scope(|s| -> io::Result<()> {
        let mut raw_line = Vec::new();
        loop {
            raw_line.clear();
            if input.read_until(b'\n', &mut raw_line)? == 0 {
                break;
            }
            // Invalid UTF-8 decodes to replacement chars and fails as JSON below.
            let line = String::from_utf8_lossy(&raw_line);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            stats.requests += 1;
            match serde_json::from_str::<Value>(trimmed) {
                Ok(raw) => {
                    let output = &output;
                    s.spawn(move || {
                        let envelope = bridge.handle_json(raw);
                        write_envelope(output, &envelope);
                    });
                }
                Err(e) => {
                    stats.rejected += 1;
                    let envelope =
                        Envelope::failure(&PanelError::invalid(format!("request is not valid JSON: {e}")));
                    write_envelope(&output, &envelope);
                }
            }
        }
        Ok(())
    });
    tracing::info!(requests = stats.requests, "input closed; stopping managed networks");
    bridge.shutdown();
    read_result.map(|_| stats)
}

fn write_envelope<W: Write>(output: &Mutex<W>, envelope: &Envelope) {
    let line = match serde_json::to_string(envelope) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response envelope");
            return;
        }
    };
    let mut out = lock_or_recover(output);
    if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "failed to write response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn answers_every_line_and_skips_blanks() {
        let bridge = Bridge::new(Settings::default()).unwrap();
        let input = b"{\"id\":1,\"command\":\"nope\"}\n\nnot json\n{\"id\":2,\"command\":\"stop_network\",\"args\":{\"project_path\":\"/nonexistent/hp-serve\"}}\n";
        let mut out = Vec::new();
        let stats = serve(&bridge, &input[..], &mut out).unwrap();
        assert_eq!(stats, ServeStats { requests: 3, rejected: 1 });

        let text = String::from_utf8(out).unwrap();
        let envelopes: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(envelopes.len(), 3);
        let by_id = |id: i64| envelopes.iter().find(|e| e["id"] == id).cloned().unwrap();
        assert_eq!(by_id(1)["error_kind"], "invalid_request");
        assert_eq!(by_id(2)["ok"], true);
        assert_eq!(by_id(2)["data"]["state"], "stopped");
        assert!(envelopes
            .iter()
            .any(|e| e.get("id").is_none() && e["error_kind"] == "invalid_request"));
    }

    #[test]
    fn undecodable_line_is_rejected_and_reading_continues() {
        let bridge = Bridge::new(Settings::default()).unwrap();
        let mut input = b"{\"id\":1,\"command\":\"nope\"}\n".to_vec();
        input.extend_from_slice(b"\xff\xfe\n");
        input.extend_from_slice(
            b"{\"id\":3,\"command\":\"stop_network\",\"args\":{\"project_path\":\"/nonexistent/hp-serve\"}}",
        );
        let mut out = Vec::new();
        let stats = serve(&bridge, &input[..], &mut out).unwrap();
        assert_eq!(stats, ServeStats { requests: 3, rejected: 1 });

        let envelopes: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(envelopes.len(), 3);
        let third = envelopes.iter().find(|e| e["id"] == 3).unwrap();
        assert_eq!(third["ok"], true);
        let rejected: Vec<&Value> = envelopes.iter().filter(|e| e.get("id").is_none()).collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0]["error_kind"], "invalid_request");
    }
}
