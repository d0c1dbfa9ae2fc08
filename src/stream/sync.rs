//! Subtitle synchronization
//!
//! Re-times and re-renders a loaded WebVTT track. The text transform is a
//! pure function of the raw text, the timing offset and the punctuation
//! flag; styling never touches the text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::stream::subtitles::WEBVTT_HEADER;

/// Characters moved by the punctuation flip
pub const FLIP_PUNCTUATION: &[char] = &['?', '.', '!', ':', ',', '-', '"'];

/// `HH:MM:SS.mmm`, or `MM:SS.mmm` when the hours are omitted
const TIMESTAMP_PATTERN: &str = r"(?:(\d{2,}):)?(\d{2}):(\d{2})\.(\d{3})";

// =============================================================================
// Settings
// =============================================================================

/// User adjustable presentation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    pub timing_offset_seconds: f64,
    pub font_size_px: u16,
    pub color: String,
    pub vertical_position_percent: u8,
    pub font_family: String,
    pub flip_punctuation: bool,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            timing_offset_seconds: 0.0,
            font_size_px: 24,
            color: "#FFFFFF".to_string(),
            vertical_position_percent: 90,
            font_family: "Arial".to_string(),
            flip_punctuation: true,
        }
    }
}

impl SubtitleSettings {
    /// Offset in whole milliseconds
    pub fn offset_millis(&self) -> i64 {
        (self.timing_offset_seconds * 1000.0).round() as i64
    }

    fn text_key(&self) -> TextKey {
        TextKey {
            offset_ms: self.offset_millis(),
            flip: self.flip_punctuation,
        }
    }
}

/// Parameters that change the caption text itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextKey {
    offset_ms: i64,
    flip: bool,
}

// =============================================================================
// Timing
// =============================================================================

/// Shift every `start --> end` pair by `offset_seconds`, flooring at zero
pub fn shift_timestamps(text: &str, offset_seconds: f64) -> String {
    let offset_ms = (offset_seconds * 1000.0).round() as i64;
    shift_timestamps_ms(text, offset_ms)
}

fn shift_timestamps_ms(text: &str, offset_ms: i64) -> String {
    if offset_ms == 0 {
        return text.to_string();
    }
    let Some(re) = Regex::new(TIMESTAMP_PATTERN).ok() else {
        return text.to_string();
    };

    map_lines(text, |line| {
        if !line.contains("-->") {
            return line.to_string();
        }
        re.replace_all(line, |caps: &regex::Captures| {
            let field = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .unwrap_or(0)
            };
            let millis = field(1)
                .saturating_mul(3_600_000)
                .saturating_add(field(2) * 60_000 + field(3) * 1000 + field(4));
            format_timestamp(millis.saturating_add(offset_ms).max(0))
        })
        .into_owned()
    })
}

/// `HH:MM:SS.mmm`; hours widen past two digits when needed
pub fn format_timestamp(millis: i64) -> String {
    let millis = millis.max(0);
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis % 1000)
}

// =============================================================================
// Punctuation
// =============================================================================

/// Move a leading punctuation run to the end of each caption text line
pub fn flip_punctuation(text: &str) -> String {
    map_lines(text, flip_line)
}

fn flip_line(line: &str) -> String {
    let trimmed = line.trim();
    let passthrough = trimmed.is_empty()
        || trimmed.contains("-->")
        || trimmed.chars().all(|c| c.is_ascii_digit())
        || trimmed.chars().all(|c| FLIP_PUNCTUATION.contains(&c));
    if passthrough {
        return line.to_string();
    }

    let rest = line.trim_start_matches(FLIP_PUNCTUATION);
    if rest.len() == line.len() {
        return line.to_string();
    }
    let run = &line[..line.len() - rest.len()];
    format!("{}{}", rest.trim_start(), run)
}

/// Apply `f` to every line, keeping line structure and a trailing newline
fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out: Vec<String> = text.lines().map(f).collect();
    if text.ends_with('\n') {
        out.push(String::new());
    }
    out.join("\n")
}

// =============================================================================
// Style
// =============================================================================

/// Presentation derived from settings; never alters cue text
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_size_px: u16,
    pub color: String,
    pub vertical_position_percent: u8,
    pub font_family: String,
}

impl From<&SubtitleSettings> for CaptionStyle {
    fn from(settings: &SubtitleSettings) -> Self {
        Self {
            font_size_px: settings.font_size_px,
            color: settings.color.clone(),
            vertical_position_percent: settings.vertical_position_percent.min(100),
            font_family: settings.font_family.clone(),
        }
    }
}

impl CaptionStyle {
    /// `::cue` rule for the track
    pub fn css(&self) -> String {
        format!(
            "::cue {{ font-size: {}px; color: {}; font-family: {}; }}",
            self.font_size_px, self.color, self.font_family
        )
    }

    /// Cue setting placing captions vertically
    pub fn line_setting(&self) -> String {
        format!("line:{}%", self.vertical_position_percent)
    }
}

// =============================================================================
// Track
// =============================================================================

/// Renderable caption track attached to the active player
#[derive(Debug, Clone)]
pub struct RenderedTrack {
    /// Transient handle; a new one is issued whenever the text changes
    pub handle: Uuid,
    pub body: String,
    pub style: CaptionStyle,
}

impl RenderedTrack {
    /// WebVTT with a STYLE block and the line setting on each cue
    pub fn export(&self) -> String {
        let line_setting = self.style.line_setting();
        let mut out = String::new();
        let mut header_done = false;

        for line in self.body.lines() {
            if !header_done && line.trim_start().starts_with(WEBVTT_HEADER) {
                out.push_str(line);
                out.push_str("\n\nSTYLE\n");
                out.push_str(&self.style.css());
                out.push('\n');
                header_done = true;
                continue;
            }
            out.push_str(line);
            if line.contains("-->") {
                out.push(' ');
                out.push_str(&line_setting);
            }
            out.push('\n');
        }
        out
    }
}

/// Working state of the loaded subtitle
pub struct SubtitleTrack {
    raw: String,
    settings: SubtitleSettings,
    rendered: RenderedTrack,
    text_key: TextKey,
    text_renders: u32,
}

impl SubtitleTrack {
    /// Wrap normalized WebVTT text and render it with `settings`
    pub fn new(raw: impl Into<String>, settings: SubtitleSettings) -> Self {
        let raw = raw.into();
        let text_key = settings.text_key();
        let rendered = RenderedTrack {
            handle: Uuid::new_v4(),
            body: render_text(&raw, text_key),
            style: CaptionStyle::from(&settings),
        };
        Self {
            raw,
            settings,
            rendered,
            text_key,
            text_renders: 1,
        }
    }

    pub fn settings(&self) -> &SubtitleSettings {
        &self.settings
    }

    pub fn rendered(&self) -> &RenderedTrack {
        &self.rendered
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of times the caption text was recomputed
    pub fn text_renders(&self) -> u32 {
        self.text_renders
    }

    /// Re-render with new settings
    ///
    /// The text is always derived from the raw payload, so repeated calls
    /// with the same settings never accumulate shifts or flips.
    pub fn apply_settings(&mut self, settings: SubtitleSettings) -> &RenderedTrack {
        let key = settings.text_key();
        if key != self.text_key {
            debug!(offset_ms = key.offset_ms, flip = key.flip, "re-rendering subtitle text");
            self.rendered.body = render_text(&self.raw, key);
            self.rendered.handle = Uuid::new_v4();
            self.text_key = key;
            self.text_renders += 1;
        }
        self.rendered.style = CaptionStyle::from(&settings);
        self.settings = settings;
        &self.rendered
    }

    /// Restore default settings and re-render
    pub fn reset(&mut self) -> &RenderedTrack {
        self.apply_settings(SubtitleSettings::default())
    }
}

fn render_text(raw: &str, key: TextKey) -> String {
    let shifted = shift_timestamps_ms(raw, key.offset_ms);
    if key.flip {
        flip_punctuation(&shifted)
    } else {
        shifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:03.500\n?מה שלומך\n\n2\n00:00:04.250 --> 00:00:06.000\n...\n";

    #[test]
    fn test_offset_zero_is_identity() {
        assert_eq!(shift_timestamps(SAMPLE, 0.0), SAMPLE);
    }

    #[test]
    fn test_shift_round_trip() {
        let forward = shift_timestamps(SAMPLE, 5.0);
        assert!(forward.contains("00:00:06.000 --> 00:00:08.500"));
        assert_eq!(shift_timestamps(&forward, -5.0), SAMPLE);
    }

    #[test]
    fn test_shift_clamps_at_zero() {
        let shifted = shift_timestamps(SAMPLE, -2.0);
        assert!(shifted.contains("00:00:00.000 --> 00:00:01.500"));
        assert!(shifted.contains("00:00:02.250 --> 00:00:04.000"));
    }

    #[test]
    fn test_shift_short_form_cues() {
        let text = "WEBVTT\n\n00:01.000 --> 00:02.500\nשלום\n";
        let shifted = shift_timestamps(text, 5.0);
        assert_eq!(shifted, "WEBVTT\n\n00:00:06.000 --> 00:00:07.500\nשלום\n");

        // Mixed forms on one line
        let mixed = shift_timestamps("00:59.500 --> 00:01:00.500", 1.0);
        assert_eq!(mixed, "00:01:00.500 --> 00:01:01.500");
    }

    #[test]
    fn test_shift_huge_offset_saturates() {
        let late = shift_timestamps(SAMPLE, 1e300);
        assert!(!late.contains("00:00:01.000"));
        assert!(!late.contains("00:00:00.000"));

        let early = shift_timestamps(SAMPLE, -1e300);
        assert!(early.contains("00:00:00.000 --> 00:00:00.000"));

        let track = SubtitleTrack::new(
            SAMPLE,
            SubtitleSettings {
                timing_offset_seconds: 1e300,
                ..SubtitleSettings::default()
            },
        );
        assert!(track.rendered().body.contains("-->"));
    }

    #[test]
    fn test_shift_fractional_offset() {
        let shifted = shift_timestamps("00:00:01.000 --> 00:00:02.000\n", 0.25);
        assert_eq!(shifted, "00:00:01.250 --> 00:00:02.250\n");
    }

    #[test]
    fn test_shift_leaves_cue_text() {
        let text = "00:00:01.000 --> 00:00:02.000\nat 00:00:01.000 sharp\n";
        let shifted = shift_timestamps(text, 1.0);
        assert!(shifted.contains("at 00:00:01.000 sharp"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00.000");
        assert_eq!(format_timestamp(3_723_004), "01:02:03.004");
        assert_eq!(format_timestamp(-50), "00:00:00.000");
    }

    #[test]
    fn test_flip_moves_leading_run() {
        assert_eq!(flip_line("?מה שלומך"), "מה שלומך?");
        assert_eq!(flip_line("- כן"), "כן-");
        assert_eq!(flip_line("!?לא"), "לא!?");
        assert_eq!(flip_line("...אולי"), "אולי...");
    }

    #[test]
    fn test_flip_passthrough_lines() {
        assert_eq!(flip_line(""), "");
        assert_eq!(flip_line("12"), "12");
        assert_eq!(flip_line("..."), "...");
        assert_eq!(flip_line("00:00:01.000 --> 00:00:02.000"), "00:00:01.000 --> 00:00:02.000");
        assert_eq!(flip_line("שלום."), "שלום.");
    }

    #[test]
    fn test_apply_same_settings_does_not_drift() {
        let mut settings = SubtitleSettings::default();
        settings.timing_offset_seconds = 2.0;
        let mut track = SubtitleTrack::new(SAMPLE, settings.clone());
        let first = track.rendered().body.clone();

        track.apply_settings(settings.clone());
        track.apply_settings(settings);

        assert_eq!(track.rendered().body, first);
        assert_eq!(track.text_renders(), 1);
        assert!(first.contains("מה שלומך?"));
        assert!(first.contains("00:00:03.000 --> 00:00:05.500"));
    }

    #[test]
    fn test_style_change_keeps_text() {
        let mut track = SubtitleTrack::new(SAMPLE, SubtitleSettings::default());
        let handle = track.rendered().handle;

        let mut settings = SubtitleSettings::default();
        settings.font_size_px = 32;
        settings.color = "#FFFF00".to_string();
        track.apply_settings(settings);

        assert_eq!(track.text_renders(), 1);
        assert_eq!(track.rendered().handle, handle);
        assert!(track.rendered().style.css().contains("font-size: 32px"));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut settings = SubtitleSettings::default();
        settings.timing_offset_seconds = -1.5;
        settings.flip_punctuation = false;
        let mut track = SubtitleTrack::new(SAMPLE, settings);

        track.reset();

        assert_eq!(track.settings(), &SubtitleSettings::default());
        assert!(track.rendered().body.contains("00:00:01.000 --> 00:00:03.500"));
        assert!(track.rendered().body.contains("מה שלומך?"));
    }

    #[test]
    fn test_export_adds_style() {
        let track = SubtitleTrack::new(SAMPLE, SubtitleSettings::default());
        let exported = track.rendered().export();
        assert!(exported.starts_with("WEBVTT\n\nSTYLE\n::cue {"));
        assert!(exported.contains("00:00:01.000 --> 00:00:03.500 line:90%"));
    }
}
