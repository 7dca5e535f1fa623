// ---------------------------------------------------------------------------
// NDJSON frame writer
// ---------------------------------------------------------------------------
//
// One JSON value per line. Clones share the same sink, so the request loop
// and the background build thread can both write; each frame is serialized
// up front and then written and flushed under the sink lock, so frames never
// interleave. Write failures are returned to the caller.
// ---------------------------------------------------------------------------

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::protocol::{JsonRpcErrorBody, JsonRpcNotification, JsonRpcResponse};

#[derive(Debug)]
pub struct NdjsonTransport<W> {
	sink: Arc<Mutex<W>>,
}

impl<W> Clone for NdjsonTransport<W> {
	fn clone(&self) -> Self {
		Self {
			sink: Arc::clone(&self.sink),
		}
	}
}

impl NdjsonTransport<io::Stdout> {
	pub fn stdout() -> Self {
		Self::new(io::stdout())
	}
}

impl<W: Write> NdjsonTransport<W> {
	pub fn new(sink: W) -> Self {
		Self {
			sink: Arc::new(Mutex::new(sink)),
		}
	}

	pub fn write_response(&self, id: u64, result: serde_json::Value) -> io::Result<()> {
		self.write_frame(&JsonRpcResponse::success(id, result))
	}

	pub fn write_error(
		&self,
		id: u64,
		code: i32,
		message: impl Into<String>,
		data: Option<serde_json::Value>,
	) -> io::Result<()> {
		let body = JsonRpcErrorBody {
			code,
			message: message.into(),
			data,
		};
		self.write_frame(&JsonRpcResponse::failure(id, body))
	}

	pub fn write_notification(&self, method: &str, params: serde_json::Value) -> io::Result<()> {
		self.write_frame(&JsonRpcNotification::new(method, params))
	}

	fn write_frame(&self, value: &impl Serialize) -> io::Result<()> {
		let mut line = serde_json::to_vec(value)?;
		line.push(b'\n');
		let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
		sink.write_all(&line)?;
		sink.flush()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Clone, Default)]
	struct Shared(Arc<Mutex<Vec<u8>>>);

	impl Write for Shared {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl Shared {
		fn text(&self) -> String {
			String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
		}
	}

	struct Failing(io::ErrorKind);

	impl Write for Failing {
		fn write(&mut self, _: &[u8]) -> io::Result<usize> {
			Err(self.0.into())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn frames_are_newline_delimited() {
		let sink = Shared::default();
		let transport = NdjsonTransport::new(sink.clone());
		transport.write_response(7, serde_json::json!({ "ok": true })).unwrap();
		transport
			.write_error(8, -32601, "Unknown method: x", None)
			.unwrap();
		transport
			.write_notification("model/built", serde_json::json!({ "generation": 1 }))
			.unwrap();

		let text = sink.text();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines.len(), 3);
		assert!(text.ends_with('\n'));
		assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#);
		assert_eq!(
			lines[1],
			r#"{"jsonrpc":"2.0","id":8,"error":{"code":-32601,"message":"Unknown method: x"}}"#
		);
		assert_eq!(
			lines[2],
			r#"{"jsonrpc":"2.0","method":"model/built","params":{"generation":1}}"#
		);
	}

	#[test]
	fn clones_share_one_sink() {
		let sink = Shared::default();
		let transport = NdjsonTransport::new(sink.clone());
		let writers: Vec<_> = (0..4)
			.map(|t| {
				let transport = transport.clone();
				std::thread::spawn(move || {
					for i in 0..25 {
						transport.write_response(t * 100 + i, serde_json::json!("x")).unwrap();
					}
				})
			})
			.collect();
		for w in writers {
			w.join().unwrap();
		}
		let text = sink.text();
		assert_eq!(text.lines().count(), 100);
		for line in text.lines() {
			let frame: serde_json::Value = serde_json::from_str(line).unwrap();
			assert_eq!(frame["result"], "x");
		}
	}

	#[test]
	fn write_errors_reach_the_caller() {
		let transport = NdjsonTransport::new(Failing(io::ErrorKind::BrokenPipe));
		let err = transport.write_response(1, serde_json::Value::Null).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
	}
}
