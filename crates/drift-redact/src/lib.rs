//! Secret masking for environment snapshots.
//!
//! Snapshots record environment variables from the host and from foreign
//! process environments. Before a value lands in a snapshot it passes
//! through this crate:
//!
//! - [`is_secret_name`] decides whether a variable name looks sensitive,
//!   using a fixed, case-insensitive pattern set covering generic secret
//!   vocabulary, cloud provider credentials, AI service keys, database
//!   credentials, token-exchange schemes, and payment/messaging tokens.
//! - [`mask_value`] irreversibly redacts a value, keeping only its first
//!   and last two characters (`su****ue`); short values become `****`.
//!
//! Masking is one-way on purpose: two snapshots of the same host still
//! compare equal on masked values, while the report never carries the
//! secret itself.

mod mask;
mod patterns;

pub use mask::mask_value;
pub use patterns::is_secret_name;
