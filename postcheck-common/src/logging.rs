//! Event streams and subscriber setup.
//!
//! Events are split by target into three streams:
//!
//! | Macro         | Target                | Carries                                  |
//! |---------------|-----------------------|------------------------------------------|
//! | [`outgoing!`] | `postcheck::outgoing` | messages handed to the mail service      |
//! | [`incoming!`] | `postcheck::incoming` | records observed in the record store     |
//! | [`internal!`] | `postcheck::internal` | the runner itself                        |
//!
//! so one stream can be turned up without drowning in the others, e.g.
//! `LOG_LEVEL=info,postcheck::incoming=debug` to watch every candidate the
//! matcher is offered.

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer,
    filter::{FilterFn, Targets},
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

pub const OUTGOING: &str = "postcheck::outgoing";
pub const INCOMING: &str = "postcheck::incoming";
pub const INTERNAL: &str = "postcheck::internal";

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "LOG_LEVEL";

/// Events about messages handed to the mail service.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::tracing::event!(target: "postcheck::outgoing", $crate::tracing::Level::$level, $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::outgoing!(level = TRACE, $($msg),*)
    };
}

/// Events about records observed in the record store.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::tracing::event!(target: "postcheck::incoming", $crate::tracing::Level::$level, $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::incoming!(level = TRACE, $($msg),*)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::tracing::event!(target: "postcheck::internal", $crate::tracing::Level::$level, $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = TRACE, $($msg),*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Build the stream filter from `explicit` directives, falling back to
/// `from_env` and then to the build's default level.
///
/// Directives are a default level and/or `target=level` pairs separated by
/// commas. Unparseable directives are reported and ignored.
pub fn stream_filter(explicit: Option<&str>, from_env: Option<&str>) -> Targets {
    let fallback = Targets::new().with_default(default_level());

    let given = |directives: &&str| !directives.trim().is_empty();
    let Some(directives) = explicit.filter(given).or_else(|| from_env.filter(given)) else {
        return fallback;
    };

    directives.parse().unwrap_or_else(|err| {
        eprintln!("Invalid log directives '{directives}' ({err}), defaulting to {}", default_level());
        fallback
    })
}

/// Install the global subscriber.
///
/// `directives` overrides `LOG_LEVEL`; see [`stream_filter`]. Only
/// `postcheck*` targets are emitted.
pub fn init(directives: Option<&str>) {
    let from_env = std::env::var(LOG_ENV).ok();
    let filter = stream_filter(directives, from_env.as_deref());

    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .with_target(true)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(filter)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("postcheck")
                })),
        )
        .init();
}
