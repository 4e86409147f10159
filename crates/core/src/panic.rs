use std::panic::{self, PanicHookInfo};

use crate::{
    context::CaptureContext,
    event::{Event, NativeErrorKind, RawError},
    queue::PendingQueue,
};

/// Queue an event for every panic, then hand over to the previously installed hook.
///
/// The event is written synchronously; the next retry pass delivers it.
pub fn install_panic_hook(queue: PendingQueue, ctx: CaptureContext) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let event = Event::from_raw_error(&ctx, &panic_error(info));
        if let Err(e) = queue.persist_blocking(&event) {
            tracing::error!(event_id = %event.id(), error = %e, "could not queue panic event");
        }
        previous(info);
    }));
}

/// Describe a panic as a fatal native error at the panic location.
pub fn panic_error(info: &PanicHookInfo<'_>) -> RawError {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Box<dyn Any>".to_string());

    let (file, line) = info
        .location()
        .map(|loc| (loc.file().to_string(), loc.line()))
        .unwrap_or_default();

    RawError {
        code: NativeErrorKind::Error.code(),
        message,
        file,
        line,
    }
}
