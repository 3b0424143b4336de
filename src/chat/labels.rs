use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{to_turns, Labeler};
use crate::config::LabelConfig;
use crate::error::StoreError;
use crate::langbase::Message;
use crate::store::{Role, SessionStore};

const ELLIPSIS: &str = "...";

/// Input handed to a [`Labeler`].
#[derive(Debug, Clone)]
pub struct LabelRequest {
    /// Text of the message being captioned.
    pub content: String,
    /// Author of the message.
    pub role: Role,
    /// Turns that came right before it on the same path, oldest first.
    pub context: Vec<Message>,
}

/// Deterministic caption built from the first `words` words of `content`.
///
/// Adds `...` when anything was dropped, and never exceeds `max_chars`
/// characters, ellipsis included. Below three characters there is no room for
/// the ellipsis, so the text is cut plain.
pub fn fallback_label(content: &str, words: usize, max_chars: usize) -> String {
    let words = words.max(1);
    let all: Vec<&str> = content.split_whitespace().collect();
    let joined = all[..all.len().min(words)].join(" ");

    let clipped = all.len() > words || joined.chars().count() > max_chars;
    if !clipped {
        return joined;
    }

    let ellipsis_len = ELLIPSIS.chars().count();
    if max_chars < ellipsis_len {
        return take_chars(&joined, max_chars);
    }

    let mut label = take_chars(&joined, max_chars - ellipsis_len);
    label.push_str(ELLIPSIS);
    label
}

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect::<String>().trim_end().to_string()
}

/// Clean up a caption returned by the label pipe.
///
/// Keeps the first line, strips quotes, a `Label:`-style prefix and trailing
/// punctuation, and cuts at a word boundary to fit `max_chars`. Returns an
/// empty string when nothing usable is left.
pub fn sanitize_label(raw: &str, max_chars: usize) -> String {
    let is_quote = |c: char| {
        matches!(c, '"' | '\'' | '`' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
    };

    let first_line = raw.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut cleaned = first_line.trim().trim_matches(is_quote).trim();

    for prefix in ["Label:", "Caption:", "label:", "caption:"] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.trim_start();
        }
    }

    let cleaned = cleaned.trim_matches(is_quote).trim();

    let mut truncated: String = cleaned.chars().take(max_chars).collect();
    if cleaned.chars().count() > max_chars {
        if let Some(last_space) = truncated.rfind(' ') {
            truncated.truncate(last_space);
        }
    }

    truncated
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '-' | ':' | ',' | ';'))
        .trim()
        .to_string()
}

/// Caption for one stored message. Never fails.
///
/// Uses the labeler when enabled, and falls back to [`fallback_label`] on any
/// error or empty result.
pub async fn generate_label(
    store: &SessionStore,
    labeler: &dyn Labeler,
    config: &LabelConfig,
    session_id: &str,
    message_id: &str,
) -> Option<String> {
    let path = match store.path_to(session_id, message_id).await {
        Ok(path) => path,
        Err(e) => {
            debug!(session_id = %session_id, message_id = %message_id, error = %e, "Nothing to label");
            return None;
        }
    };
    let (target, before) = path.split_last()?;

    let fallback = || fallback_label(&target.content, config.fallback_words, config.max_chars);

    if !config.enabled {
        return Some(fallback());
    }

    let skip = before.len().saturating_sub(config.context_turns);
    let request = LabelRequest {
        content: target.content.clone(),
        role: target.role,
        context: to_turns(&before[skip..]),
    };

    match labeler.label(request).await {
        Ok(label) if !label.trim().is_empty() => Some(sanitize_label(&label, config.max_chars))
            .filter(|l| !l.is_empty())
            .or_else(|| Some(fallback())),
        Ok(_) => {
            debug!(session_id = %session_id, message_id = %message_id, "Empty label, using fallback");
            Some(fallback())
        }
        Err(e) => {
            warn!(
                session_id = %session_id,
                message_id = %message_id,
                error = %e,
                "Label generation failed, using fallback"
            );
            Some(fallback())
        }
    }
}

/// Label `message_ids` in the background, in order.
///
/// The returned handle may be dropped; the task keeps running. Messages that
/// disappeared or sessions that were never there are skipped silently.
pub fn spawn_label_task(
    store: Arc<SessionStore>,
    labeler: Arc<dyn Labeler>,
    config: LabelConfig,
    session_id: String,
    message_ids: Vec<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        for message_id in message_ids {
            let Some(label) =
                generate_label(&store, labeler.as_ref(), &config, &session_id, &message_id).await
            else {
                continue;
            };

            match store.attach_label(&session_id, &message_id, label.clone()).await {
                Ok(()) => {
                    debug!(session_id = %session_id, message_id = %message_id, label = %label, "Label attached");
                }
                Err(StoreError::MessageNotFound { .. } | StoreError::SessionNotFound { .. }) => {}
                Err(e) => {
                    warn!(session_id = %session_id, message_id = %message_id, error = %e, "Failed to attach label");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockLabeler;
    use crate::error::LangbaseError;

    fn config() -> LabelConfig {
        LabelConfig {
            enabled: true,
            context_turns: 4,
            max_chars: 40,
            fallback_words: 6,
        }
    }

    #[test]
    fn test_fallback_short_content_unchanged() {
        assert_eq!(fallback_label("Hello there", 6, 40), "Hello there");
    }

    #[test]
    fn test_fallback_drops_extra_words() {
        assert_eq!(
            fallback_label("one two three four five six seven", 6, 40),
            "one two three four five six..."
        );
    }

    #[test]
    fn test_fallback_caps_length_including_ellipsis() {
        let long = "Supercalifragilisticexpialidocious antidisestablishmentarianism";
        let label = fallback_label(long, 6, 40);

        assert!(label.ends_with("..."));
        assert_eq!(label.chars().count(), 40);
    }

    #[test]
    fn test_fallback_dropped_words_stay_within_limit() {
        let label = fallback_label("abcdef abcdef abcdef abcdef abcde abcd extra", 6, 40);

        assert_eq!(label, "abcdef abcdef abcdef abcdef abcde abc...");
        assert_eq!(label.chars().count(), 40);
    }

    #[test]
    fn test_fallback_tiny_limit_has_no_ellipsis() {
        assert_eq!(fallback_label("hello world", 6, 2), "he");
        assert_eq!(fallback_label("hello world", 1, 0), "");
        assert!(fallback_label("hello world", 1, 3).chars().count() <= 3);
    }

    #[test]
    fn test_fallback_never_exceeds_max_chars() {
        let content = "the quick brown fox jumps over the lazy dog again and again";
        for max_chars in 0..=60 {
            for words in 1..=12 {
                let label = fallback_label(content, words, max_chars);
                assert!(
                    label.chars().count() <= max_chars,
                    "words={} max_chars={} label={:?}",
                    words,
                    max_chars,
                    label
                );
            }
        }
    }

    #[test]
    fn test_fallback_collapses_whitespace() {
        assert_eq!(fallback_label("  Hello\n\n  world  ", 6, 40), "Hello world");
    }

    #[test]
    fn test_sanitize_strips_quotes_and_prefix() {
        assert_eq!(sanitize_label("\"Chicken joke\"", 40), "Chicken joke");
        assert_eq!(sanitize_label("Label: Rust lifetimes.", 40), "Rust lifetimes");
        assert_eq!(sanitize_label("\n\nFirst line\nsecond line", 40), "First line");
    }

    #[test]
    fn test_sanitize_cuts_at_word_boundary() {
        let label = sanitize_label("Comparing async runtimes for embedded targets", 20);
        assert_eq!(label, "Comparing async");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_label("  \"\" ", 40), "");
    }

    #[tokio::test]
    async fn test_generate_label_uses_labeler_with_context() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let u1 = store.append_user_turn(&sid, "Tell me a joke").await.unwrap();
        let a1 = store
            .append_assistant_turn(&sid, &u1, "Why did the chicken cross the road?")
            .await
            .unwrap();

        let mut labeler = MockLabeler::new();
        labeler
            .expect_label()
            .withf(|req| req.role == Role::Assistant && req.context.len() == 1)
            .times(1)
            .returning(|_| Ok("\"Chicken joke\"".to_string()));

        let label = generate_label(&store, &labeler, &config(), &sid, &a1).await;
        assert_eq!(label.as_deref(), Some("Chicken joke"));
    }

    #[tokio::test]
    async fn test_generate_label_limits_context_turns() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let mut parent = store.append_user_turn(&sid, "u0").await.unwrap();
        for i in 0..4 {
            parent = store
                .append_assistant_turn(&sid, &parent, &format!("a{}", i))
                .await
                .unwrap();
            parent = store.append_user_turn(&sid, &format!("u{}", i + 1)).await.unwrap();
        }

        let mut labeler = MockLabeler::new();
        labeler
            .expect_label()
            .withf(|req| req.context.len() == 2 && req.context[0].content == "u3")
            .returning(|_| Ok("Short".to_string()));

        let config = LabelConfig {
            context_turns: 2,
            ..config()
        };
        let label = generate_label(&store, &labeler, &config, &sid, &parent).await;
        assert_eq!(label.as_deref(), Some("Short"));
    }

    #[tokio::test]
    async fn test_generate_label_falls_back_on_error() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let u1 = store
            .append_user_turn(&sid, "How do I reverse a linked list in place")
            .await
            .unwrap();

        let mut labeler = MockLabeler::new();
        labeler.expect_label().returning(|_| {
            Err(LangbaseError::Api {
                status: 500,
                message: "boom".to_string(),
            })
        });

        let label = generate_label(&store, &labeler, &config(), &sid, &u1).await;
        assert_eq!(label.as_deref(), Some("How do I reverse a linked..."));
    }

    #[tokio::test]
    async fn test_generate_label_falls_back_on_blank() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let u1 = store.append_user_turn(&sid, "Hello").await.unwrap();

        let mut labeler = MockLabeler::new();
        labeler.expect_label().returning(|_| Ok("   ".to_string()));

        let label = generate_label(&store, &labeler, &config(), &sid, &u1).await;
        assert_eq!(label.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_generate_label_disabled_skips_labeler() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let u1 = store.append_user_turn(&sid, "Hello").await.unwrap();

        let mut labeler = MockLabeler::new();
        labeler.expect_label().never();

        let config = LabelConfig {
            enabled: false,
            ..config()
        };
        let label = generate_label(&store, &labeler, &config, &sid, &u1).await;
        assert_eq!(label.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_generate_label_unknown_message() {
        let store = SessionStore::new();
        let sid = store.create_session().await;
        let labeler = MockLabeler::new();

        assert!(generate_label(&store, &labeler, &config(), &sid, "missing")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_spawn_label_task_attaches_labels() {
        let store = Arc::new(SessionStore::new());
        let sid = store.create_session().await;
        let u1 = store.append_user_turn(&sid, "Hello").await.unwrap();
        let a1 = store.append_assistant_turn(&sid, &u1, "Hi").await.unwrap();

        let mut labeler = MockLabeler::new();
        labeler
            .expect_label()
            .returning(|req| Ok(format!("{} turn", req.role)));

        spawn_label_task(
            Arc::clone(&store),
            Arc::new(labeler),
            config(),
            sid.clone(),
            vec![u1.clone(), a1.clone(), "missing".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(
            store.message(&sid, &u1).await.unwrap().label.as_deref(),
            Some("user turn")
        );
        assert_eq!(
            store.message(&sid, &a1).await.unwrap().label.as_deref(),
            Some("assistant turn")
        );
    }
}
