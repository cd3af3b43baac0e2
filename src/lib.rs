//! # resolv-wrapper
//!
//! Point an application's DNS lookups at a test-controlled nameserver.
//!
//! A [`Dispatcher`] plays the part of the C resolver's `res_ninit`,
//! `res_nquery`, `res_nsearch` and `res_nclose`. It initializes a
//! [`ResolverState`] from the host configuration, then lets the
//! environment replace the nameservers:
//!
//! - `RESOLV_WRAPPER_NAMESERVER`: one IPv4 nameserver
//! - `RESOLV_WRAPPER_CONF`: a `resolv.conf`-style nameserver list
//! - `RESOLV_WRAPPER_HOSTS`: a fake hosts file answered without any network
//! - `RESOLV_WRAPPER_DEBUGLEVEL`: log verbosity, 0 to 3
//!
//! The [`DnsServer`] is the other half: a UDP nameserver answering from a
//! static [`RecordTable`], meant to be started by a test harness.
//!
//! ```rust,no_run
//! use resolv_wrapper::{Dispatcher, DnsMessage, RecordClass, RecordType, ResolverState};
//!
//! let mut dispatcher = Dispatcher::from_env()?;
//! let mut state = ResolverState::new();
//! dispatcher.init(&mut state)?;
//!
//! let reply = dispatcher.query(&state, "cwrap.org", RecordClass::IN.to_u16(), RecordType::A.to_u16())?;
//! let message = DnsMessage::from_bytes(&reply)?;
//! println!("{} answers", message.answers.len());
//!
//! dispatcher.close(&mut state);
//! # Ok::<(), resolv_wrapper::ResolvError>(())
//! ```

pub mod config;
pub mod dispatcher;
pub mod dns_header;
pub mod dns_message;
pub mod dns_question_and_answer;
pub mod error;
pub mod forwarder;
pub mod local;
pub mod logging;
pub mod real_resolver;
pub mod resolver_state;
pub mod server;

pub use config::Overrides;
pub use dispatcher::Dispatcher;
pub use dns_header::{DnsFlags, DnsHeader};
pub use dns_message::{DnsMessage, DnsQuery};
pub use dns_question_and_answer::{DnsAnswer, DnsQuestion, RData, RecordClass, RecordType};
pub use error::{CodecError, ResolvError, Result};
pub use local::RecordTable;
pub use real_resolver::{RealResolver, SystemResolver};
pub use resolver_state::ResolverState;
pub use server::DnsServer;
