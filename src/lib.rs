// SPDX-License-Identifier: Apache-2.0
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod server;
pub mod tls;
pub mod token;
