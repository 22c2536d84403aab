//! Call arguments, modeled as a sum of "one value" or "a stream of values"
//! (§9 "Streaming arguments"): `Client::call` drains a `Stream` producer,
//! encoding each value as its own framed RPC value.

use common::io::Streamable;

pub enum Args<T> {
    Single(T),
    Stream(Box<dyn Streamable<Item = T> + Send>),
}

impl<T> Args<T> {
    pub fn single(value: T) -> Self {
        Args::Single(value)
    }

    pub fn stream(stream: impl Streamable<Item = T> + Send + 'static) -> Self {
        Args::Stream(Box::new(stream))
    }
}
