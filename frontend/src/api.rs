use chat_core::{ChatRequest, check_status};
use futures_util::Stream;
use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

/// Base URL of the relay server.
const API_BASE: &str = "http://localhost:5000";

/// Posts `prompt` to the relay and returns the response body as a stream of
/// raw byte chunks, in arrival order.
///
/// A non-2xx status is an error; nothing of its body is streamed.
pub async fn open_chat_stream(
    prompt: &str,
) -> Result<impl Stream<Item = Result<Vec<u8>, String>>, String> {
    let body = ChatRequest { prompt: prompt.to_string() };

    let resp = Request::post(&format!("{API_BASE}/chat"))
        .json(&body)
        .map_err(|e| format!("Serialize error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;

    if !resp.ok() {
        let body = resp.text().await.unwrap_or_default();
        check_status(resp.status(), &body)?;
    }

    let reader = resp
        .body()
        .ok_or("Response has no body")?
        .get_reader()
        .unchecked_into::<ReadableStreamDefaultReader>();

    Ok(futures_util::stream::unfold(Some(reader), |reader| async move {
        let reader = reader?;
        match read_chunk(&reader).await {
            Ok(Some(bytes)) => Some((Ok(bytes), Some(reader))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

/// Reads the next chunk; `None` once the body is exhausted.
async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>, String> {
    let result = JsFuture::from(reader.read())
        .await
        .map_err(|e| format!("Stream error: {e:?}"))?;

    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(|e| format!("Stream error: {e:?}"))?
        .as_bool()
        .unwrap_or(true);
    if done {
        return Ok(None);
    }

    let value = Reflect::get(&result, &JsValue::from_str("value"))
        .map_err(|e| format!("Stream error: {e:?}"))?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}
