use tokio::sync::mpsc;

use crate::trawler::HANDOFF_CAPACITY;

/// Fans several channels into one (fan-in).
///
/// Each input gets a forwarding task holding a clone of the output sender; the
/// output closes after every input has closed and been drained. No ordering is
/// kept between or within inputs.
pub fn merge<T: Send + 'static>(sources: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

    for mut source in sources {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(item) = source.recv().await {
                if tx.send(item).await.is_err() {
                    log::debug!("Merged receiver went away, dropping remaining items");
                    break;
                }
            }
        });
    }

    rx
}
