// ==========================================
// 光伏 BOS 配置引擎 - 用户通知
// ==========================================
// 职责: 定义通知发布 trait，引擎不依赖具体界面
// 说明: 文案全部来自 i18n，引擎只决定级别与键
// ==========================================

use crate::i18n;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// 通知级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationLevel::Info => "INFO",
            NotificationLevel::Success => "SUCCESS",
            NotificationLevel::Error => "ERROR",
        }
    }
}

/// 用户通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    /// 由 i18n 键构造
    ///
    /// # 参数
    /// - title_key: 标题键
    /// - message_key: 正文键
    /// - args: 正文插值参数
    pub fn from_keys(
        level: NotificationLevel,
        title_key: &str,
        message_key: &str,
        args: &[(&str, &str)],
    ) -> Self {
        let message = if args.is_empty() {
            i18n::t(message_key)
        } else {
            i18n::t_with_args(message_key, args)
        };
        Self::new(level, i18n::t(title_key), message)
    }
}

// ==========================================
// 通知发布 Trait
// ==========================================

/// 通知接收方
///
/// 实现方负责展示（界面提示、日志、测试收集）
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// 空操作通知接收方
#[derive(Debug, Clone, Default)]
pub struct NoOpNotificationSink;

impl NotificationSink for NoOpNotificationSink {
    fn notify(&self, notification: Notification) {
        tracing::debug!(
            level = notification.level.as_str(),
            title = %notification.title,
            "NoOpNotificationSink: 跳过通知"
        );
    }
}

/// 收集通知（测试与 CLI 输出使用）
#[derive(Debug, Default)]
pub struct CollectingNotificationSink {
    items: Mutex<Vec<Notification>>,
}

impl CollectingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<Notification> {
        self.items
            .lock()
            .map(|mut items| std::mem::take(&mut *items))
            .unwrap_or_default()
    }
}

impl NotificationSink for CollectingNotificationSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut items) = self.items.lock() {
            items.push(notification);
        }
    }
}

/// 可选的通知接收方包装
///
/// 简化 Option<Arc<dyn NotificationSink>> 的使用
pub struct OptionalNotificationSink {
    inner: Option<Arc<dyn NotificationSink>>,
}

impl OptionalNotificationSink {
    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        Self { inner: Some(sink) }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn notify(&self, notification: Notification) {
        match &self.inner {
            Some(sink) => sink.notify(notification),
            None => {
                tracing::debug!(
                    level = notification.level.as_str(),
                    title = %notification.title,
                    "OptionalNotificationSink: 未配置接收方，跳过通知"
                );
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalNotificationSink {
    fn default() -> Self {
        Self::none()
    }
}
