//! Delivery rules: which messages a viewer gets to see.

use crate::message::Message;
use std::num::NonZeroUsize;

/// Whether `viewer` may read `message`.
///
/// Broadcasts are visible to everyone; anything else only to its sender and
/// its recipient.
#[must_use]
pub fn is_visible(message: &Message, viewer: &str) -> bool {
    message.to.is_everyone() || message.from == viewer || message.to.is(viewer)
}

/// Filter an append-ordered sequence down to what `viewer` may read.
///
/// With a `limit`, only the last `limit` visible messages are kept, still in
/// append order.
pub fn visible<I>(
    messages: I,
    viewer: &str,
    limit: Option<NonZeroUsize>,
) -> impl Iterator<Item = Message>
where
    I: IntoIterator<Item = Message>,
{
    let matching: Vec<Message> = messages
        .into_iter()
        .filter(|m| is_visible(m, viewer))
        .collect();

    let skip = limit.map_or(0, |n| matching.len().saturating_sub(n.get()));
    matching.into_iter().skip(skip)
}
