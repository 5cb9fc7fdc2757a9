//! 入站 / 出站事件
//!
//! 线上格式为 `{"event": <名称>, "data": <负载>}` 的 JSON 文本帧。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::MessageEnvelope;
use crate::errors::{DomainError, DomainResult};

/// 客户端发来的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// 注册显示名称
    Register { name: String },
    /// 公开消息
    SendPublicMessage { text: String },
    /// 私聊消息
    SendPrivateMessage { to: String, message: String },
    /// 正在输入，`to` 为空表示公开输入
    Typing { to: Option<String> },
    /// 修改显示名称
    ChangeUsername { new_name: String },
    /// 主动断开
    Disconnect,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct PrivatePayload {
    to: String,
    message: String,
}

impl ClientEvent {
    /// 解析一个文本帧。
    pub fn parse(text: &str) -> DomainResult<Self> {
        let frame: RawFrame = serde_json::from_str(text)
            .map_err(|err| DomainError::malformed_event(err.to_string()))?;

        match frame.event.as_str() {
            "register" => Ok(Self::Register {
                name: expect_string(&frame.event, frame.data)?,
            }),
            "sendPublicMessage" => Ok(Self::SendPublicMessage {
                text: expect_string(&frame.event, frame.data)?,
            }),
            "sendPrivateMessage" => {
                let payload: PrivatePayload =
                    serde_json::from_value(frame.data).map_err(|err| {
                        DomainError::malformed_event(format!("sendPrivateMessage: {err}"))
                    })?;
                let to = payload.to.trim();
                if to.is_empty() {
                    return Err(DomainError::malformed_event(
                        "sendPrivateMessage: recipient cannot be empty",
                    ));
                }
                Ok(Self::SendPrivateMessage {
                    to: to.to_owned(),
                    message: payload.message,
                })
            }
            "typing" => match frame.data {
                Value::Null => Ok(Self::Typing { to: None }),
                Value::String(to) => {
                    let to = to.trim();
                    Ok(Self::Typing {
                        to: (!to.is_empty()).then(|| to.to_owned()),
                    })
                }
                _ => Err(DomainError::malformed_event(
                    "typing: expected a recipient name or null",
                )),
            },
            "changeUsername" => Ok(Self::ChangeUsername {
                new_name: expect_string(&frame.event, frame.data)?,
            }),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(DomainError::malformed_event(format!("unknown event \"{other}\""))),
        }
    }

    /// 事件名称，用于日志与拒绝回复。
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::SendPublicMessage { .. } => "sendPublicMessage",
            Self::SendPrivateMessage { .. } => "sendPrivateMessage",
            Self::Typing { .. } => "typing",
            Self::ChangeUsername { .. } => "changeUsername",
            Self::Disconnect => "disconnect",
        }
    }
}

fn expect_string(event: &str, data: Value) -> DomainResult<String> {
    match data {
        Value::String(value) => Ok(value),
        _ => Err(DomainError::malformed_event(format!("{event}: expected a string"))),
    }
}

/// 发给请求方的拒绝回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// 被拒绝的事件名称
    pub event: String,
    /// 稳定错误码
    pub code: String,
    /// 可读说明
    pub message: String,
}

impl Rejection {
    pub fn new(event: impl Into<String>, error: &DomainError) -> Self {
        Self {
            event: event.into(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// 服务器发出的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(MessageEnvelope),
    #[serde(rename = "userList")]
    UserList(Vec<String>),
    #[serde(rename = "error")]
    Error(Rejection),
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn envelope(&self) -> Option<&MessageEnvelope> {
        match self {
            ServerEvent::Message(envelope) => Some(envelope),
            _ => None,
        }
    }
}
