//! Request and response shapes, one module per endpoint family.

use serde::Serialize;

/// Generates chainable setters for optional request fields:
/// `with_top_k => top_k: i32` becomes `fn with_top_k(self, i32) -> Self`.
macro_rules! option_setters {
    ($($setter:ident => $field:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Set `", stringify!($field), "`.")]
            pub fn $setter(mut self, value: $ty) -> Self {
                self.$field = Some(value);
                self
            }
        )*
    };
}

pub mod completion;
pub mod embedding;
pub mod openai;
pub mod server;
pub mod tokenize;

/// Wraps a request with the `stream` flag chosen by the operation invoked.
///
/// Request values never carry the flag themselves, so one request can be
/// sent both ways without being touched.
#[derive(Debug, Serialize)]
pub(crate) struct Streamed<'a, R: Serialize> {
    #[serde(flatten)]
    pub request: &'a R,
    pub stream: bool,
}

impl<'a, R: Serialize> Streamed<'a, R> {
    pub fn new(request: &'a R, stream: bool) -> Self {
        Self { request, stream }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Probe {
        prompt: &'static str,
    }

    #[test]
    fn test_stream_flag_is_merged_into_body() {
        let probe = Probe { prompt: "hi" };
        assert_eq!(
            serde_json::to_value(Streamed::new(&probe, true)).unwrap(),
            json!({"prompt": "hi", "stream": true})
        );
        assert_eq!(
            serde_json::to_value(Streamed::new(&probe, false)).unwrap(),
            json!({"prompt": "hi", "stream": false})
        );
    }
}
