mod deflate_codec;

pub use deflate_codec::DeflateCodec;
