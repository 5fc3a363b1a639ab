//! # API Route Modules
//!
//! Each module owns its request/response DTOs, its router and its
//! handlers. Handlers translate between JSON and ledger calls and hold
//! no business rules of their own.

pub mod disputes;
pub mod escrow;
pub mod events;
pub mod projects;
