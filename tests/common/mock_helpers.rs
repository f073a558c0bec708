//! Mock construction helpers

use super::builders::ConfigBuilder;
use serialvis_rs::backend::{MockDevice, MockTransport, RecordingSink, SerialBackend};
use serialvis_rs::{Event, StatusNotice};
use std::sync::{Arc, Mutex};

/// Backend over a mock device with a recording sink and a recording observer
pub struct MockRig {
    pub backend: SerialBackend,
    pub device: MockDevice,
    pub sink: RecordingSink,
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl MockRig {
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new())
    }

    pub fn with_config(builder: ConfigBuilder) -> Self {
        let (transport, device) = MockTransport::new();
        let sink = RecordingSink::new();
        let backend = SerialBackend::new(builder.build(), transport).with_sink(sink.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        backend.set_observer(recording_observer(events.clone()));

        Self {
            backend,
            device,
            sink,
            events,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn waiting_notices(&self) -> usize {
        self.sink
            .count(|n| matches!(n, StatusNotice::WaitingForDevice { .. }))
    }
}

/// Observer that appends every event to `events`
pub fn recording_observer(
    events: Arc<Mutex<Vec<Event>>>,
) -> serialvis_rs::backend::Observer {
    Arc::new(move |event: &Event| events.lock().unwrap().push(event.clone()))
}
