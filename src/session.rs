//! Device session: reader tasks and the injector actor
//!
//! Each grabbed source runs its own reader task with its own
//! [`SourcePipeline`]. Decisions from all readers go over one channel to a
//! single injector task that owns the output sink, so a chord's writes and
//! its barrier are always emitted together.

use std::sync::Arc;

use anyhow::Context;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, trace};

use crate::config::RemapConfig;
use crate::device::{self, SourceStream};
use crate::error::RemapError;
use crate::event::{Decision, EventKind, RawEvent, SourceKind};
use crate::injector::{Injector, KeySink, LogSink};
use crate::remap::BindingTable;
use crate::resolver::AmbiguityResolver;
use crate::virtual_device::VirtualKeyboard;
use crate::wheel::WheelTranslator;

/// Capacity of the decision channel
const CHANNEL_CAPACITY: usize = 64;

/// Everything one physical source needs to turn raw events into decisions
pub struct SourcePipeline {
    kind: SourceKind,
    resolver: AmbiguityResolver,
    wheel: WheelTranslator,
}

impl SourcePipeline {
    pub fn new(kind: SourceKind, bindings: Arc<BindingTable>, wheel: WheelTranslator) -> Self {
        Self {
            kind,
            resolver: AmbiguityResolver::new(bindings),
            wheel,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Decisions completed by `event`, in emission order
    pub fn process(&mut self, event: &RawEvent) -> Vec<Decision> {
        match event.kind {
            EventKind::Key => self.resolver.feed(event.code, event.value),
            EventKind::RelativeAxis => self
                .wheel
                .feed(event.code, event.value)
                .map(Vec::from)
                .unwrap_or_default(),
        }
    }
}

/// Decisions produced by one raw event
#[derive(Debug, Clone)]
pub struct Batch {
    pub source: SourceKind,
    pub decisions: Vec<Decision>,
}

/// Injector actor: applies batches to `sink` one at a time until every
/// sender is gone. Returns the number of decisions that produced writes.
pub async fn run_injector<S: KeySink>(
    mut rx: mpsc::Receiver<Batch>,
    injector: Injector,
    mut sink: S,
) -> Result<u64, RemapError> {
    let mut injected = 0;
    while let Some(batch) = rx.recv().await {
        trace!(source = %batch.source, count = batch.decisions.len(), "batch");
        for decision in &batch.decisions {
            if injector.inject(decision, &mut sink)? {
                injected += 1;
            }
        }
    }
    debug!("Injector finished after {} decisions", injected);
    Ok(injected)
}

/// Reader loop: runs `events` through `pipeline` and forwards non-empty
/// batches. Ends with the first read error, or `Ok` when the stream ends.
pub async fn forward_events<St>(
    mut events: St,
    mut pipeline: SourcePipeline,
    tx: mpsc::Sender<Batch>,
) -> Result<(), RemapError>
where
    St: Stream<Item = Result<RawEvent, RemapError>> + Unpin,
{
    while let Some(event) = events.next().await {
        let event = event?;
        trace!(?event, "raw");
        let decisions = pipeline.process(&event);
        if decisions.is_empty() {
            continue;
        }
        tx.send(Batch {
            source: pipeline.kind(),
            decisions,
        })
        .await
        .map_err(|_| RemapError::ChannelClosed)?;
    }
    Ok(())
}

/// Raw events of a source stream; non key/relative events are skipped
fn raw_events(source: SourceStream) -> impl Stream<Item = Result<RawEvent, RemapError>> + Unpin {
    let kind = source.kind;
    Box::pin(
        futures::stream::unfold(source, |mut source| async move {
            let next = source.next_event().await;
            Some((next, source))
        })
        .filter_map(move |next| async move {
            match next {
                Ok(event) => RawEvent::from_input(kind, &event).map(Ok),
                Err(e) => Some(Err(e)),
            }
        }),
    )
}

/// Run the remapper until Ctrl-C or a fatal error.
///
/// With `dry_run` the sources are read without grabbing and decisions are
/// logged instead of written to a virtual device.
pub async fn run(config: &RemapConfig, dry_run: bool) -> anyhow::Result<()> {
    let table = Arc::new(config.remap_table()?);
    let bindings = Arc::new(config.binding_table()?);
    let wheel = WheelTranslator::new(config.wheel_top.clone(), config.wheel_bottom.clone());
    info!(
        "Loaded {} button outputs and {} code bindings",
        table.len(),
        bindings.len()
    );

    let filter = config.device_filter()?;
    let sources = device::discover(&filter)?;

    let injector = Injector::new(Arc::clone(&table), config.chord_release);
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let mut injector_task = if dry_run {
        info!("Dry run: sources are not grabbed and no virtual device is created");
        tokio::spawn(run_injector(rx, injector, LogSink::default()))
    } else {
        let mut keyboard = VirtualKeyboard::new(&config.device_name, &table)?;
        info!("Created virtual device: {}", config.device_name);
        if let Some(path) = keyboard.device_path() {
            info!("Device path: {}", path.display());
        }
        tokio::spawn(run_injector(rx, injector, keyboard))
    };

    let mut readers = JoinSet::new();
    for source in sources {
        let kind = source.kind;
        let stream = if dry_run {
            source.observe()?
        } else {
            source.grab()?
        };
        let pipeline = SourcePipeline::new(kind, Arc::clone(&bindings), wheel.clone());
        readers.spawn(forward_events(raw_events(stream), pipeline, tx.clone()));
    }
    drop(tx);

    info!("Remapping. Press Ctrl+C to exit.");

    let outcome: anyhow::Result<()> = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            signal.context("Failed to listen for Ctrl+C")
        }
        Some(joined) = readers.join_next() => joined
            .context("Reader task panicked")
            .and_then(|result| result.map_err(anyhow::Error::from)),
        joined = &mut injector_task => joined
            .context("Injector task panicked")
            .and_then(|result| result.map(|_| ()).map_err(anyhow::Error::from)),
    };

    // Dropping the reader futures closes the sources and releases the grabs
    readers.abort_all();
    while readers.join_next().await.is_some() {}
    injector_task.abort();

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Transition;
    use crate::injector::{ChordRelease, RecordingSink, SinkWrite};
    use crate::remap::{CodeBinding, Output, RemapTable};
    use evdev::{Key, RelativeAxisType};

    const C: u16 = Key::KEY_C.code();
    const I: u16 = Key::KEY_I.code();

    fn pipeline(kind: SourceKind) -> SourcePipeline {
        let bindings = BindingTable::new(vec![
            (
                C,
                CodeBinding::Ambiguous {
                    primary: "b3".into(),
                    fallback: "b8".into(),
                },
            ),
            (I, CodeBinding::Single("b8".into())),
        ])
        .unwrap();
        SourcePipeline::new(
            kind,
            Arc::new(bindings),
            WheelTranslator::new("iwt".into(), "iwb".into()),
        )
    }

    #[test]
    fn test_pipeline_routes_by_kind() {
        let mut p = pipeline(SourceKind::Mouse);
        let wheel = RawEvent::relative(
            SourceKind::Mouse,
            RelativeAxisType::REL_WHEEL_HI_RES.0,
            -120,
        );
        assert_eq!(
            p.process(&wheel),
            vec![
                Decision::new("iwb".into(), Transition::Press),
                Decision::new("iwb".into(), Transition::Release)
            ]
        );
        assert!(p.process(&RawEvent::key(SourceKind::Mouse, C, 1)).is_empty());
    }

    #[test]
    fn test_sources_keep_separate_context() {
        let mut keyboard = pipeline(SourceKind::Keyboard);
        let mut mouse = pipeline(SourceKind::Mouse);
        keyboard.process(&RawEvent::key(SourceKind::Keyboard, C, 1));
        mouse.process(&RawEvent::key(SourceKind::Mouse, I, 1));
        // The mouse's I press does not turn the keyboard's C into a modifier
        assert_eq!(
            keyboard
                .process(&RawEvent::key(SourceKind::Keyboard, C, 0))
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_forward_and_inject() {
        let table = RemapTable::new(vec![
            ("b3".into(), Output::Key(Key::KEY_SEMICOLON)),
            (
                "b8".into(),
                Output::Chord {
                    key: Key::KEY_W,
                    modifier: Key::KEY_LEFTCTRL,
                },
            ),
        ])
        .unwrap();
        let injector = Injector::new(Arc::new(table), ChordRelease::AsPressed);
        let (tx, rx) = mpsc::channel(4);

        let keys = [(C, 1), (C, 0), (C, 1), (I, 1), (I, 0), (C, 0)];
        let events = futures::stream::iter(keys.map(|(code, value)| {
            Ok::<_, RemapError>(RawEvent::key(SourceKind::Keyboard, code, value))
        }));
        let reader = tokio::spawn(forward_events(events, pipeline(SourceKind::Keyboard), tx));

        let sink = RecordingSink::new();
        let count = run_injector(rx, injector, sink).await.unwrap();
        reader.await.unwrap().unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_read_error_ends_reader() {
        let (tx, _rx) = mpsc::channel(4);
        let events = futures::stream::iter(vec![Err(RemapError::Read {
            kind: SourceKind::Mouse,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })]);
        let result = forward_events(events, pipeline(SourceKind::Mouse), tx).await;
        assert!(matches!(result, Err(RemapError::Read { .. })));
    }

    #[tokio::test]
    async fn test_injector_writes_whole_chord_per_decision() {
        let table = RemapTable::new(vec![(
            "b1".into(),
            Output::Chord {
                key: Key::KEY_S,
                modifier: Key::KEY_LEFTCTRL,
            },
        )])
        .unwrap();
        let injector = Injector::new(Arc::new(table), ChordRelease::AsPressed);
        let (tx, rx) = mpsc::channel(4);
        for source in [SourceKind::Keyboard, SourceKind::Mouse] {
            tx.send(Batch {
                source,
                decisions: Decision::tap(&"b1".into()).to_vec(),
            })
            .await
            .unwrap();
        }
        drop(tx);

        let mut sink = RecordingSink::new();
        let count = run_injector(rx, injector, &mut sink).await.unwrap();
        assert_eq!(count, 4);
        let groups: Vec<_> = sink.writes.split(|w| *w == SinkWrite::Sync).collect();
        // Four chords, each two keys, plus the empty tail after the last barrier
        assert_eq!(groups.len(), 5);
        assert!(groups[..4].iter().all(|g| g.len() == 2));
        assert_eq!(groups[0][0], SinkWrite::Key(Key::KEY_LEFTCTRL, 1));
        assert_eq!(groups[0][1], SinkWrite::Key(Key::KEY_S, 1));
    }
}
