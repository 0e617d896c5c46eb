use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("thinkstream.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("thinkstream.client.request_errors");
pub(crate) static CLIENT_CONNECT_DURATION: Moments =
    Moments::new("thinkstream.client.connect_duration_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("thinkstream.stream.bytes");
pub(crate) static STREAM_LINES: Counter = Counter::new("thinkstream.stream.lines");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("thinkstream.stream.frames");
pub(crate) static STREAM_MALFORMED_FRAMES: Counter =
    Counter::new("thinkstream.stream.malformed_frames");
pub(crate) static STREAM_TRANSPORT_FAILURES: Counter =
    Counter::new("thinkstream.stream.transport_failures");
pub(crate) static STREAM_INTERRUPTED: Counter = Counter::new("thinkstream.stream.interrupted");
pub(crate) static STREAM_FIRST_FRAGMENT: Moments =
    Moments::new("thinkstream.stream.first_fragment_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("thinkstream.stream.duration_seconds");

pub(crate) static SESSION_EXCHANGES: Counter = Counter::new("thinkstream.session.exchanges");
pub(crate) static SESSION_FAILED_EXCHANGES: Counter =
    Counter::new("thinkstream.session.failed_exchanges");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_CONNECT_DURATION);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_LINES);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_MALFORMED_FRAMES);
    collector.register_counter(&STREAM_TRANSPORT_FAILURES);
    collector.register_counter(&STREAM_INTERRUPTED);
    collector.register_moments(&STREAM_FIRST_FRAGMENT);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_EXCHANGES);
    collector.register_counter(&SESSION_FAILED_EXCHANGES);
}
