use super::*;

/// A sentence of `len` words ending in a period, with words tagged by `tag`.
/// Tags start uppercase so that Unicode segmentation sees a sentence start.
fn sentence(tag: &str, len: usize) -> String {
    let mut words: Vec<String> = (0..len).map(|i| format!("{}{}", tag, i)).collect();
    if let Some(last) = words.last_mut() {
        last.push('.');
    }
    words.join(" ")
}

/// Sentences of varying length, grouped into a few paragraphs
fn create_test_document() -> String {
    let lengths = [7, 12, 3, 25, 9, 14, 1, 30, 6, 11, 18, 4, 22, 8, 5, 16];
    lengths
        .chunks(4)
        .enumerate()
        .map(|(p, group)| {
            group
                .iter()
                .enumerate()
                .map(|(s, len)| sentence(&format!("P{}s{}w", p, s), *len))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn config(chunk_size: usize, overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        overlap,
    }
}

#[test]
fn default_config() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 800);
    assert_eq!(config.overlap, 100);
}

#[test]
fn paragraphs_split_on_blank_lines() {
    let text = "\n\nFirst paragraph\nstill first.\n\nSecond.\n  \n\t\n\nThird.\n\n";
    let paragraphs = split_paragraphs(text).expect("split should succeed");
    assert_eq!(
        paragraphs,
        vec!["First paragraph\nstill first.", "Second.", "Third."]
    );
}

#[test]
fn paragraphs_of_blank_text() {
    assert!(split_paragraphs("").expect("split").is_empty());
    assert!(split_paragraphs(" \n\n \t ").expect("split").is_empty());
}

#[test]
fn sentences_split_on_punctuation() {
    let sentences = split_sentences("First sentence. Second sentence! Third sentence?");
    assert_eq!(
        sentences,
        vec!["First sentence.", "Second sentence!", "Third sentence?"]
    );
}

#[test]
fn sentences_keep_abbreviations_together() {
    let sentences = split_sentences("Dr. Smith arrived late. He sat down.");
    assert_eq!(sentences, vec!["Dr. Smith arrived late.", "He sat down."]);
}

#[test]
fn sentences_survive_hard_wrapping() {
    let paragraph = "The tower has twelve floors served\n\
        by two lifts and a service elevator.\nParking is\nin the basement.";
    assert_eq!(
        split_sentences(paragraph),
        vec![
            "The tower has twelve floors served\nby two lifts and a service elevator.",
            "Parking is\nin the basement."
        ]
    );
}

#[test]
fn heading_line_joins_following_prose() {
    let paragraph = "## Amenities\nThe clubhouse has a pool. It opens at six.";
    assert_eq!(
        split_sentences(paragraph),
        vec!["## Amenities\nThe clubhouse has a pool.", "It opens at six."]
    );
}

#[test]
fn closing_quotes_end_sentences() {
    let sentences = split_sentences("He said \"Done.\" Then he left (quietly.) The end.");
    assert_eq!(
        sentences,
        vec!["He said \"Done.\"", "Then he left (quietly.)", "The end."]
    );
}

#[test]
fn sentences_without_boundary_are_whole() {
    let paragraph = "a heading without any terminal punctuation";
    assert_eq!(split_sentences(paragraph), vec![paragraph]);
}

#[test]
fn sentences_of_empty_paragraph() {
    assert!(split_sentences("").is_empty());
    assert!(split_sentences("   \t ").is_empty());
}

#[test]
fn sentences_preserve_every_word() {
    let paragraph = "| Unit | Area |\n|---|---|\n| 2 BHK | 850 sq.ft. | Mr. X said: \"Yes!\" Then... nothing? OK.";
    let from_sentences: Vec<&str> = split_sentences(paragraph)
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect();
    let original: Vec<&str> = paragraph.split_whitespace().collect();
    assert_eq!(from_sentences, original);
}

#[test]
fn empty_document() {
    let chunks = chunk_document("", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());

    let chunks =
        chunk_document(" \n\n\t \n", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn single_word_document() {
    let chunks = chunk_document("hello", &ChunkingConfig::default()).expect("chunking");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "hello");
    assert_eq!(chunks[0].word_count, 1);
    assert_eq!(chunks[0].index, 0);
}

#[test]
fn two_paragraph_document() {
    // 600 words in 50-word sentences, then one 500-word sentence
    let first: Vec<String> = (0..12).map(|i| sentence(&format!("A{}w", i), 50)).collect();
    let second = sentence("B", 500);
    let text = format!("{}\n\n{}", first.join(" "), second);

    let lists = chunk_word_lists(&text, &config(800, 100)).expect("chunking should succeed");
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].len(), 600);

    let second_words: Vec<&str> = second.split_whitespace().collect();
    assert_eq!(lists[1].len(), 600);
    assert_eq!(lists[1][..100], lists[0][500..]);
    assert_eq!(lists[1][100..], second_words[..]);
}

#[test]
fn overlap_matches_previous_tail() {
    let text = create_test_document();
    let overlap = 5;
    let lists = chunk_word_lists(&text, &config(40, overlap)).expect("chunking should succeed");
    assert!(lists.len() > 3);

    for pair in lists.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        assert!(previous.len() >= overlap);
        assert_eq!(next[..overlap], previous[previous.len() - overlap..]);
    }
}

#[test]
fn chunks_reconstruct_document() {
    let text = create_test_document();
    let overlap = 5;
    let lists = chunk_word_lists(&text, &config(40, overlap)).expect("chunking should succeed");

    let mut rebuilt: Vec<&str> = lists[0].clone();
    for pair in lists.windows(2) {
        let carried = if pair[0].len() >= overlap { overlap } else { 0 };
        rebuilt.extend_from_slice(&pair[1][carried..]);
    }

    let original: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(rebuilt, original);
}

#[test]
fn chunks_end_on_sentence_boundaries() {
    let text = create_test_document();
    let chunks = chunk_document(&text, &config(40, 5)).expect("chunking should succeed");

    for chunk in &chunks {
        assert!(
            chunk.text.ends_with('.'),
            "chunk {} ends mid-sentence: {}",
            chunk.index,
            chunk.text
        );
    }
}

#[test]
fn wrapped_sentences_are_not_split_across_chunks() {
    let text = "Alpha beta gamma delta epsilon zeta\neta theta iota kappa. Lambda mu.";
    let lists = chunk_word_lists(text, &config(8, 0)).expect("chunking should succeed");
    assert_eq!(
        lists,
        vec![
            vec![
                "Alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota",
                "kappa."
            ],
            vec!["Lambda", "mu."],
        ]
    );
}

#[test]
fn wrapped_document_chunks_end_on_sentence_boundaries() {
    // Hard-wrap every paragraph after each seventh word
    let mut text = String::from("# Brochure\n");
    for (p, paragraph) in create_test_document().split("\n\n").enumerate() {
        if p > 0 {
            text.push_str("\n\n");
        }
        for (i, word) in paragraph.split(' ').enumerate() {
            if i > 0 {
                text.push(if i % 7 == 0 { '\n' } else { ' ' });
            }
            text.push_str(word);
        }
    }

    let chunks = chunk_document(&text, &config(40, 5)).expect("chunking should succeed");
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.text.ends_with('.'),
            "chunk {} ends mid-sentence: {}",
            chunk.index,
            chunk.text
        );
    }

    let lists = chunk_word_lists(&text, &config(40, 0)).expect("chunking should succeed");
    let rebuilt: Vec<&str> = lists.into_iter().flatten().collect();
    let original: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(rebuilt, original);
}

#[test]
fn oversized_sentence_is_not_split() {
    let text = format!("{} {}", sentence("X", 3), sentence("Long", 12));
    let lists = chunk_word_lists(&text, &config(5, 0)).expect("chunking should succeed");
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].len(), 3);
    assert_eq!(lists[1].len(), 12);
}

#[test]
fn oversized_first_sentence_produces_no_empty_chunk() {
    let text = sentence("Long", 12);
    let chunks = chunk_document(&text, &config(5, 2)).expect("chunking should succeed");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].word_count, 12);
}

#[test]
fn zero_overlap_shares_nothing() {
    let text = create_test_document();
    let lists = chunk_word_lists(&text, &config(30, 0)).expect("chunking should succeed");
    let total: usize = lists.iter().map(Vec::len).sum();
    assert_eq!(total, text.split_whitespace().count());
}

#[test]
fn short_closed_chunk_carries_no_overlap() {
    let lists = chunk_word_lists("A b c. D e f.", &config(3, 5)).expect("chunking should succeed");
    assert_eq!(lists, vec![vec!["A", "b", "c."], vec!["D", "e", "f."]]);
}

#[test]
fn overlap_includes_carried_words() {
    let text = "A1 a2 a3. B1 b2 b3. C1 c2 c3.";
    let lists = chunk_word_lists(text, &config(4, 2)).expect("chunking should succeed");
    assert_eq!(
        lists,
        vec![
            vec!["A1", "a2", "a3."],
            vec!["a2", "a3.", "B1", "b2", "b3."],
            vec!["b2", "b3.", "C1", "c2", "c3."],
        ]
    );
}

#[test]
fn chunk_text_and_indices() {
    let text = create_test_document();
    let cfg = config(40, 5);
    let lists = chunk_word_lists(&text, &cfg).expect("chunking should succeed");
    let chunks = chunk_document(&text, &cfg).expect("chunking should succeed");

    assert_eq!(chunks.len(), lists.len());
    for (i, (chunk, words)) in chunks.iter().zip(&lists).enumerate() {
        assert_eq!(chunk.index, i);
        assert_eq!(chunk.text, words.join(" "));
        assert_eq!(chunk.word_count, words.len());
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = create_test_document();
    let cfg = config(25, 4);
    let first = chunk_document(&text, &cfg).expect("chunking should succeed");
    let second = chunk_document(&text, &cfg).expect("chunking should succeed");
    assert_eq!(first, second);
}
