use std::{marker::PhantomData, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    event::{channel::MessageTransport, envelope::ResponseEnvelope, messenger::Messenger},
    MessengerError, MessengerResult,
};

/// Sender bound to one action with typed request and response data.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use frame_messenger::{FrameChannel, Messenger, TypedSender};
/// # use serde::{Deserialize, Serialize};
/// #[derive(Serialize)]
/// struct GenerateImage { color: String }
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct GeneratedImage { image_url: String }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let messenger = Messenger::with_defaults(Arc::new(FrameChannel::default()));
/// let generate = TypedSender::<GenerateImage, GeneratedImage>::new("generate_image");
///
/// let response = generate
///     .send(&messenger, &GenerateImage { color: "#ff6b6b".into() }, None)
///     .await?;
/// if let Some(image) = response.data {
///     println!("{}", image.image_url);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TypedSender<Req, Resp> {
    action: String,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> TypedSender<Req, Resp>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            _marker: PhantomData,
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sends `payload`, which must serialize to a JSON object, and decodes the
    /// response data. A failure envelope is returned as-is with `data: None`.
    pub async fn send<T: MessageTransport + 'static>(
        &self,
        messenger: &Messenger<T>,
        payload: &Req,
        timeout: Option<Duration>,
    ) -> MessengerResult<ResponseEnvelope<Resp>> {
        let payload = match serde_json::to_value(payload)
            .map_err(|e| MessengerError::InvalidPayload(e.to_string()))?
        {
            Value::Object(fields) => fields,
            other => {
                return Err(MessengerError::InvalidPayload(format!(
                    "expected a JSON object, got {}",
                    other
                )))
            }
        };

        messenger
            .send(self.action(), Some(payload), timeout)
            .await?
            .decode()
    }
}

impl<Req, Resp> Clone for TypedSender<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            _marker: PhantomData,
        }
    }
}
