//! [`FrameCodec`]: the stateless translation between socket frames and
//! named, structured payloads.
//!
//! The codec owns a shared [`SchemaCatalog`] and nothing else. It never
//! allocates correlation indices or remembers pending requests; that is
//! the agent's job. Cloning a codec is cheap (an `Arc` bump).

use std::sync::Arc;

use serde_json::Value;

use crate::frame::{
    ACTION_PROTOTYPE, ActionPrototype, MessageKind, Wrapper, apply_action_cipher, frame,
    local_event_name, strip_index, strip_message_type,
};
use crate::{ProtocolError, SchemaCatalog};

/// A decoded frame, before the payload is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Server push. `name` is the full type name, e.g. `.lq.ActionPrototype`.
    Notification { name: String, payload: Vec<u8> },
    /// A request-tagged frame. Servers never send these to clients.
    Request { index: u16, name: String, payload: Vec<u8> },
    /// A reply to the request that used `index`.
    Response { index: u16, payload: Vec<u8> },
}

/// A notification ready for subscriber routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Local event name, e.g. `ActionDiscardTile`.
    pub name: String,
    pub payload: Value,
}

/// An encoded request envelope plus what the caller should expect back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    /// `.lq.Service.method`
    pub method: String,
    /// Wrapper bytes, without tag or index.
    pub envelope: Vec<u8>,
    /// Fully qualified response message name.
    pub response_type: String,
}

impl EncodedRequest {
    /// The complete frame for correlation index `index`.
    pub fn to_frame(&self, index: u16) -> Vec<u8> {
        frame(MessageKind::Request, index, &self.envelope)
    }
}

/// Frame encoder/decoder over a schema catalog.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    catalog: Arc<SchemaCatalog>,
}

impl FrameCodec {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn from_shared(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Splits a raw frame into its kind, index and envelope.
    pub fn decode_frame(&self, bytes: &[u8]) -> Result<InboundFrame, ProtocolError> {
        let (kind, rest) = strip_message_type(bytes)?;
        match kind {
            MessageKind::Notification => {
                let wrapper = Wrapper::decode(rest)?;
                Ok(InboundFrame::Notification {
                    name: wrapper.name,
                    payload: wrapper.data,
                })
            }
            MessageKind::Request => {
                let (index, rest) = strip_index(rest)?;
                let wrapper = Wrapper::decode(rest)?;
                Ok(InboundFrame::Request {
                    index,
                    name: wrapper.name,
                    payload: wrapper.data,
                })
            }
            MessageKind::Response => {
                let (index, rest) = strip_index(rest)?;
                let wrapper = Wrapper::decode(rest)?;
                Ok(InboundFrame::Response {
                    index,
                    payload: wrapper.data,
                })
            }
        }
    }

    /// Decodes a payload against the named schema.
    pub fn decode_payload(&self, type_name: &str, bytes: &[u8]) -> Result<Value, ProtocolError> {
        self.catalog.decode(type_name, bytes)
    }

    /// Decodes a notification envelope into the events it produces.
    ///
    /// Every notification yields one event under its local name. An
    /// `ActionPrototype` additionally yields the deciphered inner action
    /// under the inner type name, as a second event.
    pub fn decode_notification(
        &self,
        name: &str,
        payload: &[u8],
    ) -> Result<Vec<Notification>, ProtocolError> {
        let local = local_event_name(name)?;
        let outer = Notification {
            name: local.to_string(),
            payload: self.decode_payload(name, payload)?,
        };
        if local != ACTION_PROTOTYPE {
            return Ok(vec![outer]);
        }

        let proto = ActionPrototype::decode(payload)?;
        let inner = self.decode_live_action(&proto)?;
        Ok(vec![outer, inner])
    }

    /// Deciphers and decodes a live action carrier.
    pub fn decode_live_action(
        &self,
        proto: &ActionPrototype,
    ) -> Result<Notification, ProtocolError> {
        let mut data = proto.data.clone();
        apply_action_cipher(&mut data);
        Ok(Notification {
            name: proto.name.clone(),
            payload: self.decode_payload(&proto.name, &data)?,
        })
    }

    /// Decodes an archived action from a resync log. Archived entries are
    /// stored in the clear.
    pub fn decode_archived_action(
        &self,
        name: &str,
        data: &[u8],
    ) -> Result<Notification, ProtocolError> {
        Ok(Notification {
            name: name.to_string(),
            payload: self.decode_payload(name, data)?,
        })
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Encodes a call to `service.method` with the given request fields.
    ///
    /// # Errors
    /// `UnknownType`/`UnknownMethod` if the catalog lacks the method,
    /// `UnknownField`/`InvalidValue` if `fields` does not fit its request type.
    pub fn encode_request(
        &self,
        service: &str,
        method: &str,
        fields: &Value,
    ) -> Result<EncodedRequest, ProtocolError> {
        let def = self.catalog.method(service, method)?;
        let path = self.catalog.method_path(service, method)?;
        let data = self.catalog.encode(&def.request_type, fields)?;
        Ok(EncodedRequest {
            envelope: Wrapper::new(path.clone(), data).encode(),
            method: path,
            response_type: def.response_type.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Server side, for harnesses
    // -----------------------------------------------------------------------

    /// Builds a response frame as the server would send it.
    pub fn encode_response(
        &self,
        index: u16,
        response_type: &str,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        let data = self.catalog.encode(response_type, payload)?;
        Ok(frame(MessageKind::Response, index, &Wrapper::new("", data).encode()))
    }

    /// Builds a plain notification frame for `type_name` (bare or dotted).
    pub fn encode_notification(
        &self,
        type_name: &str,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        let def = self.catalog.message(type_name)?;
        let data = self.catalog.encode(type_name, payload)?;
        let name = format!(".{}", def.full_name());
        Ok(frame(MessageKind::Notification, 0, &Wrapper::new(name, data).encode()))
    }

    /// Builds a live action notification: the inner payload is encoded,
    /// ciphered and carried in an `ActionPrototype`.
    pub fn encode_action_notification(
        &self,
        step: u32,
        action: &str,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut data = self.catalog.encode(action, payload)?;
        apply_action_cipher(&mut data);
        let proto = ActionPrototype {
            step,
            name: action.to_string(),
            data,
        };
        let name = format!(".{}", self.catalog.message(ACTION_PROTOTYPE)?.full_name());
        Ok(frame(MessageKind::Notification, 0, &Wrapper::new(name, proto.encode()).encode()))
    }
}
