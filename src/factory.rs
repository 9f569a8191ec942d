//! Entry point: compile a struct once, then make views over any number of buffers.

use crate::codec::{CodecError, StaticCodec, StaticDecoder};
use crate::compiler::build_layout;
use crate::description::DataDefinition;
use crate::dynamic::{Codec, Decoder};
use crate::layout::{Layout, LayoutField, Representation};
use std::sync::Arc;

/// Owns the compiled [`Layout`] of one struct type and hands it to views.
#[derive(Debug, Clone)]
pub struct CodecFactory {
    layout: Arc<Layout>,
}

impl CodecFactory {
    pub fn new(definition: &DataDefinition, struct_name: &str) -> Result<Self, CodecError> {
        Ok(CodecFactory { layout: Arc::new(build_layout(definition, struct_name)?) })
    }

    pub fn from_layout(layout: Arc<Layout>) -> Self {
        CodecFactory { layout }
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Number of fixed elements.
    pub fn static_element_count(&self) -> usize {
        self.layout.fields().len()
    }

    pub fn static_element(&self, index: usize) -> Result<&LayoutField, CodecError> {
        let count = self.layout.fields().len();
        self.layout.fields().get(index).ok_or(CodecError::InvalidIndex { index, count })
    }

    /// Static size in bytes; the full size of a record without dynamic elements.
    pub fn static_buffer_size(&self, rep: Representation) -> usize {
        self.layout.static_byte_size(rep)
    }

    pub fn make_static_decoder_for<'a>(&self, buffer: &'a [u8], rep: Representation) -> StaticDecoder<'a> {
        StaticDecoder::new(self.layout.clone(), buffer, rep)
    }

    pub fn make_static_codec_for<'a>(&self, buffer: &'a mut [u8], rep: Representation) -> StaticCodec<'a> {
        StaticCodec::new(self.layout.clone(), buffer, rep)
    }

    pub fn make_decoder_for<'a>(&self, buffer: &'a [u8], rep: Representation) -> Result<Decoder<'a>, CodecError> {
        Decoder::new(self.layout.clone(), buffer, rep)
    }

    pub fn make_codec_for<'a>(&self, buffer: &'a mut [u8], rep: Representation) -> Result<Codec<'a>, CodecError> {
        Codec::new(self.layout.clone(), buffer, rep)
    }
}
