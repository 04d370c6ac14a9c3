//!Textual trace sink for inspection and deterministic testing.

use super::{Sink, SinkError};

///Sink that renders every event as a deterministic text token.
///
///Channel voice events become `__MIDI { .. } ` groups carrying the
///combined status|channel byte and the data bytes in decimal; meta events
///become `__MIDI_META { .. } ` groups; sysex bytes are rendered as `#xx`
///hex; loop markers keep their MML spellings (`[`, `:targets`,
///`]repeats`). String payloads get backslash and double-quote escaping so
///the stream stays re-parseable. No capability ever fails.
pub struct TraceSink {
    output: Box<dyn FnMut(&str)>,
    debug_output: Option<Box<dyn FnMut(&str)>>,
}

impl TraceSink {
    ///Create a trace sink writing tokens through `output`. Debug messages
    ///go to the same callback.
    pub fn new(output: Box<dyn FnMut(&str)>) -> TraceSink {
        TraceSink {
            output,
            debug_output: None,
        }
    }

    ///Create a trace sink with a separate callback for debug messages.
    pub fn with_debug_output(
        output: Box<dyn FnMut(&str)>,
        debug_output: Box<dyn FnMut(&str)>,
    ) -> TraceSink {
        TraceSink {
            output,
            debug_output: Some(debug_output),
        }
    }

    fn emit(&mut self, token: &str) {
        (self.output)(token);
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Sink for TraceSink {
    fn channel_event2(&mut self, channel: u8, status: u8, data: u8) -> Result<(), SinkError> {
        self.emit(&format!("__MIDI {{ {}, {} }} ", status | channel, data));
        Ok(())
    }

    fn channel_event3(
        &mut self,
        channel: u8,
        status: u8,
        data1: u8,
        data2: u8,
    ) -> Result<(), SinkError> {
        self.emit(&format!(
            "__MIDI {{ {}, {}, {} }} ",
            status | channel,
            data1,
            data2
        ));
        Ok(())
    }

    fn meta_bytes(&mut self, meta_type: u8, bytes: &[u8]) -> Result<(), SinkError> {
        let mut token = format!("__MIDI_META {{ {}", meta_type);
        for b in bytes {
            token.push_str(&format!(", {}", b));
        }
        token.push_str(" } ");
        self.emit(&token);
        Ok(())
    }

    fn meta_text(&mut self, meta_type: u8, text: &str) -> Result<(), SinkError> {
        self.emit(&format!(
            "__MIDI_META {{ {}, \"{}\" }} ",
            meta_type,
            escape(text)
        ));
        Ok(())
    }

    fn sysex(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut token = String::from("__MIDI {");
        for (i, b) in bytes.iter().enumerate() {
            if i > 0 {
                token.push(',');
            }
            token.push_str(&format!(" #{:02x}", b));
        }
        token.push_str(" } ");
        self.emit(&token);
        Ok(())
    }

    fn begin_loop(&mut self, _channel: u8) -> Result<(), SinkError> {
        self.emit("[");
        Ok(())
    }

    fn break_loop(&mut self, _channel: u8, targets: &[u32]) -> Result<(), SinkError> {
        let joined = targets
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.emit(&format!(":{}", joined));
        Ok(())
    }

    fn end_loop(&mut self, _channel: u8, repeats: u32) -> Result<(), SinkError> {
        self.emit(&format!("]{}", repeats));
        Ok(())
    }

    fn debug(&mut self, message: &str) -> Result<(), SinkError> {
        let line = format!("{}\n", message);
        match &mut self.debug_output {
            Some(out) => out(&line),
            None => (self.output)(&line),
        }
        Ok(())
    }
}
