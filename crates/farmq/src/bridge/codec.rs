//! Framed codec for queue traffic.
//!
//! Uses LengthDelimitedCodec for framing + serde_json for serialization.
//! Works over any AsyncRead/AsyncWrite.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Codec that frames messages with a length prefix and serializes with JSON.
#[derive(Debug)]
pub struct JsonCodec<T> {
    inner: LengthDelimitedCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .new_codec(),
            _phantom: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let item = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(json), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{ClientRequest, ServerReply};

    #[test]
    fn codec_roundtrip_client_request() {
        let mut codec = JsonCodec::<ClientRequest>::new();
        let mut buf = BytesMut::new();

        let req = ClientRequest::Hello {
            authkey: "secret".to_string(),
        };
        codec.encode(req, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        match decoded {
            ClientRequest::Hello { authkey } => assert_eq!(authkey, "secret"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn codec_roundtrip_server_reply() {
        let mut codec = JsonCodec::<ServerReply>::new();
        let mut buf = BytesMut::new();

        let reply = ServerReply::Value {
            item: Some(serde_json::json!(42)),
        };
        codec.encode(reply, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        match decoded {
            ServerReply::Value { item } => assert_eq!(item, Some(serde_json::json!(42))),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn codec_roundtrip_termination_marker() {
        let mut codec = JsonCodec::<ServerReply>::new();
        let mut buf = BytesMut::new();

        codec
            .encode(ServerReply::Value { item: None }, &mut buf)
            .unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert!(matches!(decoded, ServerReply::Value { item: None }));
    }

    #[test]
    fn partial_frame_decodes_to_none() {
        let mut codec = JsonCodec::<ClientRequest>::new();
        let mut buf = BytesMut::new();

        codec.encode(ClientRequest::SendSignal, &mut buf).unwrap();

        // Withhold the last byte; the decoder must wait for more input.
        let last = buf.split_off(buf.len() - 1);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.unsplit(last);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }
}
