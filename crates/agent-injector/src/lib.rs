/*
 * 5D Labs Agent Platform - Agent Injector Webhook
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Agent injector library
//!
//! Mutating admission webhook that wires the Contrast security agent into pods
//! annotated with `contrast-agent-injector/enabled`. The pipeline is:
//! annotations → agent profile → JSON Patch plan → admission response.

pub mod annotations;
pub mod config;
pub mod error;
pub mod mutate;
pub mod patch;
pub mod profiles;
pub mod webhook;

// Re-export commonly used types
pub use annotations::{parse_annotations, InjectionConfig};
pub use config::{InjectorConfig, LogFormat};
pub use error::{InjectionError, InjectionResult};
pub use mutate::{AgentInjector, InjectionRequest};
pub use patch::{plan_merge, IdentityKey};
pub use profiles::{AgentProfile, DesiredObjectSet, JavaAgentProfile, ProfileRegistry};
pub use webhook::{webhook_router, WebhookError, WebhookState};
