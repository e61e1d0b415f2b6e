use bytes::Bytes;

use super::SNIFF_BUDGET;

/// The real consumer of a response body.
///
/// The accumulator hands every chunk to its sink before looking at it, and
/// never holds a chunk back.
pub trait ChunkSink {
    /// Delivers one body chunk, unchanged.
    fn write(&mut self, chunk: Bytes);

    /// Signals that the body is complete.
    fn finish(&mut self) {}
}

impl ChunkSink for Vec<u8> {
    fn write(&mut self, chunk: Bytes) {
        self.extend_from_slice(&chunk);
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn write(&mut self, chunk: Bytes) {
        (**self).write(chunk);
    }

    fn finish(&mut self) {
        (**self).finish();
    }
}

/// Why classification fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    /// The buffered bytes reached the sniff budget.
    Budget,
    /// The body ended before reaching the budget.
    EndOfStream,
}

/// Buffered body prefix, handed out exactly once per response.
#[derive(Debug)]
pub struct SniffTrigger {
    /// Chunks in arrival order, at most [`SNIFF_BUDGET`] bytes in total
    pub chunks: Vec<Bytes>,
    pub reason: FireReason,
}

impl SniffTrigger {
    /// Total number of buffered bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
enum State {
    Observing { chunks: Vec<Bytes>, buffered: usize },
    Fired,
    Aborted,
}

/// Observes a response body as it streams through to its real consumer.
///
/// Collects chunks until [`SNIFF_BUDGET`] bytes have been seen or the body
/// ends, then yields a [`SniffTrigger`] once. After that, or after an abort,
/// it only forwards chunks and the end of body to the sink.
#[derive(Debug)]
pub struct StreamBudgetAccumulator<S> {
    sink: S,
    state: State,
}

impl<S: ChunkSink> StreamBudgetAccumulator<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: State::Observing {
                chunks: Vec::new(),
                buffered: 0,
            },
        }
    }

    /// Forwards `chunk` to the sink, then buffers it.
    ///
    /// Returns the trigger when this chunk brings the buffer to the budget;
    /// the last buffered chunk is cut so the trigger never exceeds it.
    pub fn on_chunk(&mut self, chunk: Bytes) -> Option<SniffTrigger> {
        self.sink.write(chunk.clone());

        let State::Observing { chunks, buffered } = &mut self.state else {
            return None;
        };
        let take = chunk.len().min(SNIFF_BUDGET - *buffered);
        if take > 0 {
            chunks.push(chunk.slice(..take));
            *buffered += take;
        }
        if *buffered < SNIFF_BUDGET {
            return None;
        }
        self.fire(FireReason::Budget)
    }

    /// Signals end of body. Returns the trigger if the budget was never reached.
    pub fn on_end(&mut self) -> Option<SniffTrigger> {
        self.sink.finish();
        self.fire(FireReason::EndOfStream)
    }

    /// Stops observing without a verdict. Chunks still reach the sink.
    pub fn on_abort(&mut self) {
        self.state = State::Aborted;
    }

    /// True until the trigger has been handed out or the body aborted.
    pub fn is_observing(&self) -> bool {
        matches!(self.state, State::Observing { .. })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn fire(&mut self, reason: FireReason) -> Option<SniffTrigger> {
        match std::mem::replace(&mut self.state, State::Fired) {
            State::Observing { chunks, .. } => Some(SniffTrigger { chunks, reason }),
            other => {
                self.state = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(len: usize, byte: u8) -> Bytes {
        Bytes::from(vec![byte; len])
    }

    #[test]
    fn test_fires_on_budget() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        assert!(acc.on_chunk(chunk(300, b'a')).is_none());
        let trigger = acc.on_chunk(chunk(300, b'b')).expect("budget reached");
        assert_eq!(trigger.reason, FireReason::Budget);
        assert_eq!(trigger.len(), SNIFF_BUDGET);
        assert_eq!(trigger.chunks.len(), 2);
        assert_eq!(trigger.chunks[1].len(), SNIFF_BUDGET - 300);
    }

    #[test]
    fn test_fires_on_exact_budget() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        let trigger = acc.on_chunk(chunk(SNIFF_BUDGET, b'a')).expect("budget reached");
        assert_eq!(trigger.len(), SNIFF_BUDGET);
        assert!(acc.on_end().is_none());
    }

    #[test]
    fn test_fires_on_end_with_short_body() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        assert!(acc.on_chunk(chunk(10, b'a')).is_none());
        assert!(acc.on_chunk(chunk(20, b'b')).is_none());
        let trigger = acc.on_end().expect("end of stream");
        assert_eq!(trigger.reason, FireReason::EndOfStream);
        assert_eq!(trigger.len(), 30);
    }

    #[test]
    fn test_fires_on_end_with_empty_body() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        let trigger = acc.on_end().expect("end of stream");
        assert!(trigger.is_empty());
    }

    #[test]
    fn test_fires_once() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        assert!(acc.on_chunk(chunk(1000, b'a')).is_some());
        assert!(!acc.is_observing());
        assert!(acc.on_chunk(chunk(1000, b'b')).is_none());
        assert!(acc.on_end().is_none());
    }

    #[test]
    fn test_pass_through_is_complete_and_unchanged() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        let mut expected = Vec::new();
        for i in 0..10u8 {
            let c = chunk(100, i);
            expected.extend_from_slice(&c);
            acc.on_chunk(c);
        }
        acc.on_end();
        assert_eq!(acc.into_sink(), expected);
    }

    #[test]
    fn test_abort_suppresses_trigger() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        assert!(acc.on_chunk(chunk(100, b'a')).is_none());
        acc.on_abort();
        assert!(!acc.is_observing());
        assert!(acc.on_chunk(chunk(1000, b'b')).is_none());
        assert!(acc.on_end().is_none());
    }

    #[test]
    fn test_abort_keeps_forwarding() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        acc.on_chunk(chunk(100, b'a'));
        acc.on_abort();
        acc.on_chunk(chunk(1000, b'b'));
        let sink = acc.into_sink();
        assert_eq!(sink.len(), 1100);
        assert!(sink[..100].iter().all(|&b| b == b'a'));
        assert!(sink[100..].iter().all(|&b| b == b'b'));
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let mut acc = StreamBudgetAccumulator::new(Vec::new());
        assert!(acc.on_chunk(Bytes::new()).is_none());
        let trigger = acc.on_end().expect("end of stream");
        assert!(trigger.chunks.is_empty());
    }

    struct FinishFlag(bool);

    impl ChunkSink for FinishFlag {
        fn write(&mut self, _chunk: Bytes) {}

        fn finish(&mut self) {
            self.0 = true;
        }
    }

    #[test]
    fn test_end_after_abort_finishes_sink() {
        let mut flag = FinishFlag(false);
        let mut acc = StreamBudgetAccumulator::new(&mut flag);
        acc.on_chunk(chunk(10, b'a'));
        acc.on_abort();
        assert!(acc.on_end().is_none());
        drop(acc);
        assert!(flag.0);
    }

    #[test]
    fn test_end_finishes_sink() {
        let mut flag = FinishFlag(false);
        let mut acc = StreamBudgetAccumulator::new(&mut flag);
        acc.on_chunk(chunk(SNIFF_BUDGET, b'a'));
        acc.on_end();
        drop(acc);
        assert!(flag.0);
    }
}
