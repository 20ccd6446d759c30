// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform command results.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};

/// Outcome classification for a command, mapped to HTTP by the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Ok,
    BadRequest,
    NotFound,
    Conflict,
    FailedDependency,
    Internal,
}

/// Result of a dispatched command.
///
/// `data` carries the handler's projection (a DTO serialized to JSON);
/// `error_kind` and `message` are set on non-OK outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationResult {
    pub fn ok(data: impl Into<Option<serde_json::Value>>) -> Self {
        Self {
            status: OperationStatus::Ok,
            data: data.into(),
            error_kind: None,
            message: None,
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            status: OperationStatus::Ok,
            data: None,
            error_kind: None,
            message: None,
        }
    }

    fn failure(status: OperationStatus, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            data: None,
            error_kind: Some(kind.into()),
            message: Some(message.into()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::failure(OperationStatus::BadRequest, "validation", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::failure(OperationStatus::NotFound, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::failure(OperationStatus::Conflict, "conflict", message)
    }

    pub fn failed_dependency(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure(OperationStatus::FailedDependency, kind, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::failure(OperationStatus::Internal, "internal", message)
    }

    pub fn is_ok(&self) -> bool {
        self.status == OperationStatus::Ok
    }
}

impl From<DomainError> for OperationResult {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::Validation(_) => OperationStatus::BadRequest,
            DomainError::NotFound(_) => OperationStatus::NotFound,
            DomainError::Conflict(_) => OperationStatus::Conflict,
            DomainError::Dependency(_) => OperationStatus::FailedDependency,
            DomainError::Internal(_) => OperationStatus::Internal,
        };
        Self::failure(status, err.kind(), err.to_string())
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
