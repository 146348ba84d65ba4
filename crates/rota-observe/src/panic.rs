use std::{backtrace::Backtrace, panic::PanicHookInfo, sync::Once};

static HOOK: Once = Once::new();

/// Route panics through `tracing` with a captured backtrace.
///
/// Handler panics are caught by the scheduler and reported as crashed runs;
/// this hook adds the stack so the crash can be located. The previous hook
/// still runs afterwards. Installing twice is a no-op.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture();
            tracing::error!(
                target: "rota.panic",
                message = %panic_message(info),
                location = %location(info),
                thread = std::thread::current().name().unwrap_or("<unnamed>"),
                backtrace = %backtrace,
                "panic"
            );
            previous(info);
        }));
    });
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

fn location(info: &PanicHookInfo<'_>) -> String {
    info.location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "<unknown>".to_string())
}
