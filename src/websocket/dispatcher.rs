use super::hooks::Hooks;
use super::registry::Callback;
use crate::error::EnclaveError;
use crate::types::{parse_frame, InboundFrame};
use log::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Delivered { channel: String },
    NoCallback { channel: String },
    CallbackPanicked { channel: String },
    Ignored,
    Malformed,
}

/// Parses `text` and hands `update` frames to the callback `lookup` finds for their channel.
///
/// Never fails: unparsable frames are dropped and a panicking callback is reported through
/// `hooks.on_error`, so the caller can move straight on to the next frame.
pub fn dispatch<F>(text: &str, lookup: F, hooks: &Hooks) -> Dispatch
where
    F: FnOnce(&str) -> Option<Callback>,
{
    let message = match parse_frame(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("[Dispatch] Dropping malformed frame ({}): {}", e, text);
            return Dispatch::Malformed;
        }
    };

    let channel = match InboundFrame::classify(&message) {
        InboundFrame::Update { channel } => channel,
        other => {
            trace!("[Dispatch] Ignoring frame {:?}", other);
            return Dispatch::Ignored;
        }
    };

    let Some(callback) = lookup(&channel) else {
        trace!("[Dispatch] No callback for channel {}", channel);
        return Dispatch::NoCallback { channel };
    };

    match catch_unwind(AssertUnwindSafe(|| callback(&message))) {
        Ok(()) => Dispatch::Delivered { channel },
        Err(payload) => {
            let err = EnclaveError::CallbackPanic {
                channel: channel.clone(),
                message: panic_message(payload.as_ref()),
            };
            error!("[Dispatch] {}", err);
            hooks.error(&err);
            Dispatch::CallbackPanicked { channel }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decimal_at;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Callback, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callback: Callback = {
            let seen = seen.clone();
            Arc::new(move |msg: &Value| seen.lock().unwrap().push(msg.clone()))
        };
        (callback, seen)
    }

    #[test]
    fn test_update_reaches_its_callback() {
        let (callback, seen) = recorder();
        let text = r#"{"type":"update","channel":"prices","data":{"pair":{"base":"AVAX","quote":"USDC"},"price":"21.05"}}"#;
        let outcome = dispatch(
            text,
            |channel| (channel == "prices").then(|| callback.clone()),
            &Hooks::new(),
        );

        assert_eq!(
            outcome,
            Dispatch::Delivered {
                channel: "prices".into()
            }
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], serde_json::from_str::<Value>(text).unwrap());
        assert_eq!(decimal_at(&seen[0], "/data/price").unwrap().to_string(), "21.05");
    }

    #[test]
    fn test_malformed_and_non_update_frames_are_skipped() {
        let (callback, seen) = recorder();
        let hooks = Hooks::new();
        assert_eq!(
            dispatch("{not json", |_| Some(callback.clone()), &hooks),
            Dispatch::Malformed
        );
        assert_eq!(
            dispatch(
                r#"{"type":"subscribed","channel":"prices"}"#,
                |_| Some(callback.clone()),
                &hooks
            ),
            Dispatch::Ignored
        );
        assert_eq!(
            dispatch(r#"{"type":"update","channel":"deposits"}"#, |_| None, &hooks),
            Dispatch::NoCallback {
                channel: "deposits".into()
            }
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_callback_is_reported_not_propagated() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let hooks = Hooks::new().on_error({
            let errors = errors.clone();
            move |e| errors.lock().unwrap().push(e.to_string())
        });
        let bad: Callback = Arc::new(|_: &Value| panic!("callback exploded"));
        let (good, seen) = recorder();

        let first = dispatch(
            r#"{"type":"update","channel":"fillsPerps"}"#,
            |_| Some(bad.clone()),
            &hooks,
        );
        let second = dispatch(
            r#"{"type":"update","channel":"prices"}"#,
            |_| Some(good.clone()),
            &hooks,
        );

        assert_eq!(
            first,
            Dispatch::CallbackPanicked {
                channel: "fillsPerps".into()
            }
        );
        assert_eq!(
            second,
            Dispatch::Delivered {
                channel: "prices".into()
            }
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("callback exploded"));
        assert!(errors[0].contains("fillsPerps"));
    }
}
