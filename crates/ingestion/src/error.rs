//! Ingestion 错误类型

use contracts::{ComponentState, ContractError};
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 工作线程创建失败
    #[error("failed to spawn thread {thread}: {message}")]
    SpawnFailed {
        /// 线程名
        thread: String,
        /// 错误消息
        message: String,
    },

    /// 当前生命周期状态不允许该操作
    #[error("{component}: cannot {operation} while {state:?}")]
    InvalidState {
        /// 组件名
        component: String,
        /// 当前状态
        state: ComponentState,
        /// 被拒绝的操作
        operation: &'static str,
    },

    /// 设备句柄已释放
    #[error("{component}: device handle already released")]
    Released {
        /// 组件名
        component: String,
    },
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        let component = match &err {
            IngestionError::SpawnFailed { thread, .. } => thread.clone(),
            IngestionError::InvalidState { component, .. }
            | IngestionError::Released { component } => component.clone(),
        };
        ContractError::lifecycle(component, err.to_string())
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
