//! Outgoing email assembly.

use echo_store::Message;

/// Subject shown when a message has an empty title.
const DEFAULT_TITLE: &str = "Message";

const SUBJECT_PREFIX: &str = "Echo • ";
const DELIVERED_NOTICE: &str = "— This message was delivered by Echo.";

pub fn subject(msg: &Message) -> String {
    let title = if msg.title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        msg.title.as_str()
    };
    format!("{SUBJECT_PREFIX}{title}")
}

/// Plaintext body: optional message text, the delivered-by notice,
/// then the attachment line (possibly empty).
pub fn body(msg: &Message, media_line: &str) -> String {
    let mut text = String::new();
    if let Some(ref body_text) = msg.body_text {
        text.push_str(body_text);
        text.push_str("\n\n");
    }
    text.push_str(DELIVERED_NOTICE);
    text.push_str(media_line);
    text
}

pub fn attachment_line(url: &str) -> String {
    format!("\n\nAttachment:\n{url}")
}

/// Placeholder when the media link could not be resolved — the
/// delivery itself still proceeds.
pub fn attachment_unavailable(reason: &str) -> String {
    format!("\n\n[Attachment unavailable: {reason}]")
}
