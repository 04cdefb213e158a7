// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Media Server - Authenticated File Storage Service
//!
//! Stores user media (avatars) on local disk. Uploads and deletes require a
//! bearer JWT issued by the user service and the matching permission claim;
//! downloads are public.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - JWKS key-set cache, token verification, auth/permission gates
//! - `config` - Environment configuration
//! - `storage` - File storage backend

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
