//! Fan-out/fan-in over rayon with a pre-sized result channel.
use std::sync::mpsc;

/// Run `work` once per item on the rayon pool and collect one result per item.
///
/// The channel is sized to the item count so workers never block on send,
/// and exactly that many results are drained after the scope joins. Result
/// order is completion order, not input order. A failing item reports
/// through its result and never stops its siblings.
pub fn fan_out<T, R, F>(items: Vec<T>, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let expected = items.len();
    if expected == 0 {
        return Vec::new();
    }

    let (tx, rx) = mpsc::sync_channel(expected);
    rayon::scope(|s| {
        for item in items {
            let tx = tx.clone();
            let work = &work;
            s.spawn(move |_| {
                // The receiver outlives the scope, so send cannot fail.
                let _ = tx.send(work(item));
            });
        }
    });
    drop(tx);

    rx.iter().take(expected).collect()
}

/// Run two fan-outs concurrently with each other and return both result sets.
pub fn fan_out_pair<A, B, RA, RB, FA, FB>(
    first: (Vec<A>, FA),
    second: (Vec<B>, FB),
) -> (Vec<RA>, Vec<RB>)
where
    A: Send,
    B: Send,
    RA: Send,
    RB: Send,
    FA: Fn(A) -> RA + Sync + Send,
    FB: Fn(B) -> RB + Sync + Send,
{
    let (items_a, work_a) = first;
    let (items_b, work_b) = second;
    rayon::join(|| fan_out(items_a, work_a), || fan_out(items_b, work_b))
}
