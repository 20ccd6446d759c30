// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation status → HTTP status mapping.

use labfleet_core::OperationStatus;

/// HTTP status code for a command outcome.
pub fn http_status(status: OperationStatus) -> u16 {
    match status {
        OperationStatus::Ok => 200,
        OperationStatus::BadRequest => 400,
        OperationStatus::NotFound => 404,
        OperationStatus::Conflict => 409,
        OperationStatus::FailedDependency => 424,
        OperationStatus::Internal => 500,
    }
}
