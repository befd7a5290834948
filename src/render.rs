//! Chat transcript rendering
//!
//! The conversation core only produces ordered [`ChatLogEntry`] values and an
//! optional [`SpeechClip`]; these functions turn them into something to show.

use std::fmt::Write;

use crate::conversation::{ChatLogEntry, Sender};
use crate::voice::SpeechClip;

/// Column width used to right-align bot lines in the terminal
const TERMINAL_WIDTH: usize = 80;

/// Render the transcript for a terminal
///
/// User lines sit on the left, bot lines are pushed to the right.
#[must_use]
pub fn render_terminal(entries: &[ChatLogEntry]) -> String {
    let mut out = String::new();

    for entry in entries {
        let time = entry.display_time();
        match entry.sender {
            Sender::User => {
                let _ = writeln!(out, "[{time}] you: {}", entry.text);
            }
            Sender::Bot => {
                let line = format!("bot: {} [{time}]", entry.text);
                let pad = TERMINAL_WIDTH.saturating_sub(line.chars().count());
                let _ = writeln!(out, "{}{line}", " ".repeat(pad));
            }
        }
    }

    out
}

/// Render the transcript as HTML chat bubbles
///
/// User bubbles are blue on the left, bot bubbles grey on the right. The
/// reply audio, when present, is embedded as an autoplaying element.
#[must_use]
pub fn render_html(entries: &[ChatLogEntry], speech: Option<&SpeechClip>) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>voicebot</title></head><body>\n",
    );

    for entry in entries {
        let text = escape_html(&entry.text);
        let time = entry.display_time();
        match entry.sender {
            Sender::User => {
                let _ = writeln!(
                    out,
                    "<div style=\"display:flex;align-items:center;\">\
                     <div style=\"background-color:#007AFF;color:white;border-radius:12px;padding:8px 12px;margin-right:8px;\">{text}</div>\
                     <div style=\"font-size:0.8rem;color:gray;\">{time}</div></div>"
                );
            }
            Sender::Bot => {
                let _ = writeln!(
                    out,
                    "<div style=\"display:flex;align-items:center;justify-content:flex-end;\">\
                     <div style=\"background-color:lightgray;border-radius:12px;padding:8px 12px;margin-left:8px;\">{text}</div>\
                     <div style=\"font-size:0.8rem;color:gray;\">{time}</div></div>"
                );
            }
        }
    }

    if let Some(clip) = speech {
        out.push_str(&clip.audio_tag());
        out.push('\n');
    }

    out.push_str("</body></html>\n");
    out
}

/// Escape text for inclusion in HTML
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
