/// Splits extracted text into ordered segments.
pub trait Segmenter: Send + Sync {
    fn split(&self, raw_text: &str, chunk_size: usize) -> Vec<String>;
}

/// Fixed-width character slicing with no overlap.
///
/// Boundaries ignore words and sentences, so a segment may end mid-token.
/// Widths count `char`s, never splitting a UTF-8 sequence.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedWidthSegmenter;

impl Segmenter for FixedWidthSegmenter {
    fn split(&self, raw_text: &str, chunk_size: usize) -> Vec<String> {
        let width = chunk_size.max(1);
        let chars: Vec<char> = raw_text.chars().collect();

        chars
            .chunks(width)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}
