//! 消息信封
//!
//! 路由器发出的每一条消息都封装为不可变的 [`MessageEnvelope`]。
//! 信封本身不限制投递范围：接收方依据 [`MessageEnvelope::is_visible_to`]
//! 判断消息是否属于自己。

use serde::{Deserialize, Serialize};

use crate::value_objects::Username;

/// 系统通知的发送者名称。
pub const SERVER_SENDER: &str = "server";

/// 信封类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Public,
    Private,
    Typing,
    System,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Public => "public",
            EnvelopeKind::Private => "private",
            EnvelopeKind::Typing => "typing",
            EnvelopeKind::System => "system",
        }
    }
}

/// 路由后的消息信封，构造后不可修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    kind: EnvelopeKind,
    from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
}

impl MessageEnvelope {
    /// 公开消息，发往所有人。
    pub fn public(from: &Username, message: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Public,
            from: from.to_string(),
            to: None,
            message: Some(message.into()),
            time: Some(time.into()),
        }
    }

    /// 私聊消息。收件人不必在线，名称不匹配的接收方会自行忽略。
    pub fn private(
        from: &Username,
        to: impl Into<String>,
        message: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            kind: EnvelopeKind::Private,
            from: from.to_string(),
            to: Some(to.into()),
            message: Some(message.into()),
            time: Some(time.into()),
        }
    }

    /// 正在输入提示，`to` 为空表示公开输入。
    pub fn typing(from: &Username, to: Option<String>) -> Self {
        Self {
            kind: EnvelopeKind::Typing,
            from: from.to_string(),
            to,
            message: None,
            time: None,
        }
    }

    /// 系统通知
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::System,
            from: SERVER_SENDER.to_string(),
            to: None,
            message: Some(message.into()),
            time: None,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn recipient(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    /// 是否写入历史记录。输入提示从不持久化。
    pub fn is_persistent(&self) -> bool {
        self.kind != EnvelopeKind::Typing
    }

    /// 该信封是否与给定身份相关（作为发送者或收件人）。
    pub fn involves(&self, name: &str) -> bool {
        self.from == name || self.to.as_deref() == Some(name)
    }

    /// 接收方显示规则：
    /// - 公开消息：不显示自己的回显
    /// - 私聊：只显示发给自己且不是自己发出的
    /// - 输入提示：公开的或发给自己的
    /// - 系统通知：总是显示
    pub fn is_visible_to(&self, me: &str) -> bool {
        match self.kind {
            EnvelopeKind::Public => self.from != me,
            EnvelopeKind::Private => self.to.as_deref() == Some(me) && self.from != me,
            EnvelopeKind::Typing => self.to.as_deref().map_or(true, |to| to == me),
            EnvelopeKind::System => true,
        }
    }
}
