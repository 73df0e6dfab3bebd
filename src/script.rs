//! Dialogue script handling.
//!
//! The rewrite stage produces a two-speaker script with role-prefixed
//! lines (`Host:` / `Guest:`, Chinese prefixes accepted as well). This
//! module parses that format, cleans line text for TTS input, splits
//! lines at sentence boundaries for subtitle granularity, and builds the
//! SRT and caption-track outputs consumed by the render stage.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Speaker role in the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    /// Subtitle font color for this role.
    pub fn srt_color(&self) -> &'static str {
        match self {
            Role::Host => "#FFD700",
            Role::Guest => "#00FFFF",
        }
    }
}

/// One spoken line of the dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub role: Role,
    pub content: String,
}

/// Parse a dialogue script into role-attributed lines.
///
/// Lines without a recognized role prefix are attributed to the host,
/// matching how the rewrite prompt formats its output. Empty lines are
/// skipped.
pub fn parse_script(text: &str) -> Vec<ScriptLine> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let (role, content) = match split_role_prefix(line) {
            Some((role, rest)) => (role, rest),
            None => (Role::Host, line),
        };

        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        lines.push(ScriptLine {
            role,
            content: content.to_string(),
        });
    }

    lines
}

fn split_role_prefix(line: &str) -> Option<(Role, &str)> {
    let idx = line.find([':', '：'])?;
    let (label, rest) = line.split_at(idx);
    // Skip the delimiter itself (ASCII ':' is 1 byte, '：' is 3).
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))?;

    let role = match label.trim().to_lowercase().as_str() {
        "host" | "主持人" => Role::Host,
        "guest" | "嘉宾" => Role::Guest,
        _ => return None,
    };
    Some((role, rest))
}

/// Strip characters a TTS engine cannot speak.
///
/// Removes bracketed stage directions (`(laughs)`, `[thinking]`, CJK
/// brackets included) and markdown emphasis markers.
pub fn clean_for_tts(text: &str) -> String {
    static BRACKETS: OnceLock<Regex> = OnceLock::new();
    let re = BRACKETS
        .get_or_init(|| Regex::new(r"[\(\[\{（【].*?[\)\]\}）】]").expect("valid regex"));

    let cleaned = re.replace_all(text, "");
    cleaned.replace(['*', '_'], "").trim().to_string()
}

/// Whether the text still contains something worth synthesizing.
pub fn is_speakable(text: &str) -> bool {
    text.chars().any(|c| c.is_alphanumeric())
}

/// Split text into sentence-level chunks at major punctuation.
///
/// Commas are kept inside chunks so the synthesized speech keeps its
/// natural flow; only sentence-ending punctuation starts a new chunk.
pub fn split_sentences(text: &str) -> Vec<String> {
    const TERMINATORS: [char; 7] = ['。', '！', '？', '；', '!', '?', ';'];

    let mut chunks = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if TERMINATORS.contains(&c) {
            let chunk = current.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Format milliseconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_time(ms: u64) -> String {
    let (seconds, millis) = (ms / 1000, ms % 1000);
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// One timed caption in the synthesized dialogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    /// Start time (milliseconds).
    pub start: u64,
    /// End time (milliseconds).
    pub end: u64,
    pub content: String,
    pub role: Role,
}

/// Caption track emitted next to the dialogue audio, consumed by the
/// animated renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub captions: Vec<Caption>,
    #[serde(rename = "durationInSeconds")]
    pub duration_in_seconds: f64,
}

/// Render captions as an SRT file with role-colored text.
pub fn build_srt(captions: &[Caption]) -> String {
    let mut srt = String::new();
    for (i, cap) in captions.iter().enumerate() {
        srt.push_str(&format!("{}\n", i + 1));
        srt.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cap.start),
            format_srt_time(cap.end)
        ));
        srt.push_str(&format!(
            "<font color=\"{}\">{}</font>\n\n",
            cap.role.srt_color(),
            cap.content
        ));
    }
    srt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_prefixes() {
        let script = "Host: Welcome back!\nGuest: Glad to be here.\n\n主持人：大家好。\n嘉宾: 你好。";
        let lines = parse_script(script);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].role, Role::Host);
        assert_eq!(lines[0].content, "Welcome back!");
        assert_eq!(lines[1].role, Role::Guest);
        assert_eq!(lines[2].role, Role::Host);
        assert_eq!(lines[2].content, "大家好。");
        assert_eq!(lines[3].role, Role::Guest);
    }

    #[test]
    fn test_unprefixed_line_defaults_to_host() {
        let lines = parse_script("Just a stray line.");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].role, Role::Host);
        assert_eq!(lines[0].content, "Just a stray line.");
    }

    #[test]
    fn test_clean_for_tts_strips_annotations() {
        assert_eq!(clean_for_tts("Well... (laughs) that's true"), "Well...  that's true");
        assert_eq!(clean_for_tts("这个嘛（思考）其实是这样"), "这个嘛其实是这样");
        assert_eq!(clean_for_tts("**bold** and _italic_"), "bold and italic");
        assert!(!is_speakable(clean_for_tts("(笑)").as_str()));
        assert!(is_speakable("ha!"));
    }

    #[test]
    fn test_split_sentences() {
        let chunks = split_sentences("你好，我是主持人。欢迎收听！");
        assert_eq!(chunks, vec!["你好，我是主持人。", "欢迎收听！"]);

        let chunks = split_sentences("One sentence? Two; three");
        assert_eq!(chunks, vec!["One sentence?", "Two;", "three"]);
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(3_661_500), "01:01:01,500");
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(999), "00:00:00,999");
    }

    #[test]
    fn test_build_srt() {
        let captions = vec![
            Caption {
                start: 0,
                end: 1200,
                content: "Hello".into(),
                role: Role::Host,
            },
            Caption {
                start: 1500,
                end: 2500,
                content: "Hi there".into(),
                role: Role::Guest,
            },
        ];
        let srt = build_srt(&captions);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,200\n"));
        assert!(srt.contains("<font color=\"#FFD700\">Hello</font>"));
        assert!(srt.contains("<font color=\"#00FFFF\">Hi there</font>"));
    }

    #[test]
    fn test_caption_track_json_shape() {
        let track = CaptionTrack {
            captions: vec![Caption {
                start: 0,
                end: 800,
                content: "hey".into(),
                role: Role::Guest,
            }],
            duration_in_seconds: 0.8,
        };
        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["durationInSeconds"], 0.8);
        assert_eq!(json["captions"][0]["role"], "guest");
    }
}
