//! Splits guideline text into embeddable chunks.
//!
//! Paragraphs (blank-line separated) are packed greedily up to a character
//! budget; a paragraph larger than the budget is split line by line, and a
//! single oversized line is cut at a char boundary.

/// Default characters per chunk, counting non-whitespace only.
pub const DEFAULT_CHAR_BUDGET: usize = 1500;

#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
}

struct Paragraph {
    start: usize,
    end: usize,
    weight: usize,
}

fn weight(line: &str) -> usize {
    line.chars().filter(|c| !c.is_whitespace()).count()
}

pub fn chunk_text(content: &str, budget: usize) -> Vec<TextChunk> {
    let budget = budget.max(1);
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    // (start, end, weight) of the paragraphs packed so far
    let mut pending: Option<(usize, usize, usize)> = None;

    for para in paragraphs(&lines) {
        if para.weight > budget {
            if let Some((s, e, _)) = pending.take() {
                chunks.push(make_chunk(&lines, s, e));
            }
            split_paragraph(&lines, &para, budget, &mut chunks);
            continue;
        }

        pending = match pending {
            Some((s, e, w)) if w + para.weight > budget => {
                chunks.push(make_chunk(&lines, s, e));
                Some((para.start, para.end, para.weight))
            }
            Some((s, _, w)) => Some((s, para.end, w + para.weight)),
            None => Some((para.start, para.end, para.weight)),
        };
    }

    if let Some((s, e, _)) = pending {
        chunks.push(make_chunk(&lines, s, e));
    }
    chunks
}

fn paragraphs(lines: &[&str]) -> Vec<Paragraph> {
    let mut out = Vec::new();
    let mut current: Option<Paragraph> = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            out.extend(current.take());
            continue;
        }
        let p = current.get_or_insert(Paragraph {
            start: i,
            end: i,
            weight: 0,
        });
        p.end = i;
        p.weight += weight(line);
    }
    out.extend(current);
    out
}

fn make_chunk(lines: &[&str], start: usize, end: usize) -> TextChunk {
    TextChunk {
        content: lines[start..=end].join("\n"),
        start_line: start + 1,
        end_line: end + 1,
    }
}

fn split_paragraph(lines: &[&str], para: &Paragraph, budget: usize, chunks: &mut Vec<TextChunk>) {
    let mut start = para.start;
    let mut acc = 0usize;

    for i in para.start..=para.end {
        let w = weight(lines[i]);

        if w > budget {
            if i > start {
                chunks.push(make_chunk(lines, start, i - 1));
            }
            split_line(lines[i], i, budget, chunks);
            start = i + 1;
            acc = 0;
            continue;
        }

        if acc + w > budget && i > start {
            chunks.push(make_chunk(lines, start, i - 1));
            start = i;
            acc = 0;
        }
        acc += w;
    }

    if start <= para.end {
        chunks.push(make_chunk(lines, start, para.end));
    }
}

/// Last resort for a single line over budget.
fn split_line(line: &str, index: usize, budget: usize, chunks: &mut Vec<TextChunk>) {
    let chars: Vec<char> = line.chars().collect();
    for piece in chars.chunks(budget) {
        let content: String = piece.iter().collect();
        if content.trim().is_empty() {
            continue;
        }
        chunks.push(TextChunk {
            content,
            start_line: index + 1,
            end_line: index + 1,
        });
    }
}
