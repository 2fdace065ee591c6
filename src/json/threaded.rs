//! Threaded producer for the JSON parser (spec §4.7 "The threaded variant
//! publishes a `parse_tokens_t` vector through a bounded queue identical
//! in shape to §4.5"). Structurally a twin of [`crate::xml::threaded`]:
//! same batching discipline, same owned-token tradeoff, different event
//! vocabulary.

use crate::config::ParserConfig;
use crate::error::{ImportError, Result};
use crate::json::parser::{self, JsonHandler};
use crate::strings::{InternPool, StrView};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub enum ParseToken {
    BeginObject,
    EndObject,
    ObjectKey { text: String, transient: bool },
    BeginArray,
    EndArray,
    Boolean(bool),
    Null,
    String { text: String, transient: bool },
    Number(f64),
}

pub fn parse_threaded(input: Vec<u8>, config: ParserConfig) -> (Receiver<Vec<ParseToken>>, JoinHandle<Result<()>>) {
    let capacity = (config.max_token_size / config.min_token_size.max(1)).max(1);
    let (tx, rx) = sync_channel::<Vec<ParseToken>>(capacity);

    let handle = std::thread::spawn(move || -> Result<()> {
        let mut collector = BatchingHandler::new(tx, config.min_token_size);
        let result = parser::parse(&input, &mut collector);
        collector.flush();
        result
    });

    (rx, handle)
}

struct BatchingHandler {
    tx: SyncSender<Vec<ParseToken>>,
    pending: Vec<ParseToken>,
    min_token_size: usize,
}

impl BatchingHandler {
    fn new(tx: SyncSender<Vec<ParseToken>>, min_token_size: usize) -> Self {
        BatchingHandler { tx, pending: Vec::new(), min_token_size: min_token_size.max(1) }
    }

    fn push(&mut self, token: ParseToken) {
        self.pending.push(token);
        if self.pending.len() >= self.min_token_size {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        let _ = self.tx.send(batch);
    }
}

impl JsonHandler for BatchingHandler {
    fn begin_object(&mut self) {
        self.push(ParseToken::BeginObject);
    }
    fn end_object(&mut self) {
        self.push(ParseToken::EndObject);
    }
    fn object_key(&mut self, key: StrView<'_>, transient: bool) {
        self.push(ParseToken::ObjectKey { text: key.to_string_lossy().into_owned(), transient });
    }
    fn begin_array(&mut self) {
        self.push(ParseToken::BeginArray);
    }
    fn end_array(&mut self) {
        self.push(ParseToken::EndArray);
    }
    fn boolean(&mut self, value: bool) {
        self.push(ParseToken::Boolean(value));
    }
    fn null(&mut self) {
        self.push(ParseToken::Null);
    }
    fn string(&mut self, value: StrView<'_>, transient: bool) {
        self.push(ParseToken::String { text: value.to_string_lossy().into_owned(), transient });
    }
    fn number(&mut self, value: f64) {
        self.push(ParseToken::Number(value));
    }
}

pub fn drain_into(rx: Receiver<Vec<ParseToken>>, pool: &mut InternPool, handler: &mut dyn JsonHandler) {
    handler.begin_parse();
    for batch in rx {
        for token in batch {
            replay(token, pool, handler);
        }
    }
    handler.end_parse();
}

fn replay(token: ParseToken, pool: &mut InternPool, handler: &mut dyn JsonHandler) {
    match token {
        ParseToken::BeginObject => handler.begin_object(),
        ParseToken::EndObject => handler.end_object(),
        ParseToken::ObjectKey { text, transient } => {
            let (view, _) = pool.intern_str(&text);
            handler.object_key(view, transient);
        }
        ParseToken::BeginArray => handler.begin_array(),
        ParseToken::EndArray => handler.end_array(),
        ParseToken::Boolean(b) => handler.boolean(b),
        ParseToken::Null => handler.null(),
        ParseToken::String { text, transient } => {
            let (view, _) = pool.intern_str(&text);
            handler.string(view, transient);
        }
        ParseToken::Number(n) => handler.number(n),
    }
}

pub fn join_producer(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle.join().unwrap_or_else(|_| Err(ImportError::structural("parser thread panicked", 0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingHandler {
        numbers: Vec<f64>,
        strings: usize,
    }

    impl JsonHandler for CountingHandler {
        fn number(&mut self, value: f64) {
            self.numbers.push(value);
        }
        fn string(&mut self, _value: StrView<'_>, _transient: bool) {
            self.strings += 1;
        }
    }

    #[test]
    fn threaded_json_parse_delivers_all_values() {
        let json = br#"[1, 2, 3, "a", "b"]"#.to_vec();
        let mut config = ParserConfig::default();
        config.min_token_size = 2;
        config.max_token_size = 6;

        let (rx, handle) = parse_threaded(json, config);
        let mut pool = InternPool::new();
        let mut handler = CountingHandler::default();
        drain_into(rx, &mut pool, &mut handler);
        join_producer(handle).unwrap();

        assert_eq!(handler.numbers, vec![1.0, 2.0, 3.0]);
        assert_eq!(handler.strings, 2);
    }
}
