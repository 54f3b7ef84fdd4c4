use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use byteorder::{BigEndian, ReadBytesExt};

pub const IGNORED_WORD: u16 = 0;
pub const ANY_WORD: u16 = 1;
pub const REST_OF_LINE: u16 = 9999;

/// Size of the per-letter offset table in front of the entries
const LETTER_INDEX_SIZE: usize = 26 * 2;

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Word {
    pub text: String,
    pub number: u16,
}

/// A word of parsed input; `number` is None for unknown words
#[derive(Clone,Debug,PartialEq,Eq)]
pub struct ParsedWord {
    pub text: String,
    pub number: Option<u16>,
}

/// WORDS.TOK dictionary
pub struct WordIndex {
    words: HashMap<String, u16>,
    synonyms: BTreeMap<u16, BTreeSet<String>>,
}

impl WordIndex {
    pub fn new(input: &[u8]) -> Result<WordIndex> {
        if input.len() < LETTER_INDEX_SIZE {
            return Err(anyhow!("words: letter index truncated ({} bytes)", input.len()));
        }
        let mut index = WordIndex{ words: HashMap::new(), synonyms: BTreeMap::new() };

        let mut rdr = Cursor::new(&input[LETTER_INDEX_SIZE..]);
        let mut prev: Option<String> = None;
        'entries: loop {
            let copy_amount = match rdr.read_u8() {
                Ok(n) => n as usize,
                Err(_) => break
            };
            let mut cur_word = if copy_amount == 0 {
                String::new()
            } else {
                let prev_word = prev.as_ref()
                    .ok_or_else(|| anyhow!("words: first entry copies {} characters from nothing", copy_amount))?;
                prev_word.get(0..copy_amount)
                    .ok_or_else(|| anyhow!("cannot copy {} bytes from previous word '{}'", copy_amount, prev_word))?
                    .to_string()
            };

            loop {
                let ch = match rdr.read_u8() {
                    Ok(0) | Err(_) => break 'entries,
                    Ok(ch) => ch
                };
                cur_word.push(((ch ^ 0x7f) & 0x7f) as char);
                if ch >= 0x7f { break; }
            }

            let number = rdr.read_u16::<BigEndian>()
                .with_context(|| format!("words: number of '{}' truncated", cur_word))?;
            if !index.add_word(number, &cur_word) {
                log::debug!("words: duplicate '{}' ({}) ignored", cur_word, number);
            }
            prev = Some(cur_word);
        }
        Ok(index)
    }

    /// Adds `text` as a synonym for `number`. Text already present keeps its
    /// first number and false is returned.
    pub fn add_word(&mut self, number: u16, text: &str) -> bool {
        if self.words.contains_key(text) {
            return false;
        }
        self.words.insert(text.to_string(), number);
        self.synonyms.entry(number).or_default().insert(text.to_string());
        true
    }

    pub fn number(&self, text: &str) -> Option<u16> {
        self.words.get(text).copied()
    }

    pub fn find(&self, text: &str) -> Option<Word> {
        self.number(text).map(|number| Word{ text: text.to_string(), number })
    }

    /// All texts sharing `number`, sorted
    pub fn synonyms(&self, number: u16) -> Option<&BTreeSet<String>> {
        self.synonyms.get(&number)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words ordered by number, then text
    pub fn words(&self) -> impl Iterator<Item = Word> + '_ {
        self.synonyms.iter()
            .flat_map(|(number, texts)| texts.iter().map(move |text| Word{ text: text.clone(), number: *number }))
    }

    /// Splits player input into dictionary words, preferring the longest
    /// phrase at each position. Ignored words are dropped and parsing stops
    /// at a rest-of-line word. Matching is longest-first on purpose, so a
    /// multi-word phrase wins over its leading word.
    pub fn parse(&self, input: &str) -> Vec<ParsedWord> {
        let input = input.to_lowercase();
        let tokens: Vec<&str> = input.split_whitespace().collect();

        let mut result = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let matched = (start + 1..=tokens.len()).rev()
                .find_map(|end| {
                    let phrase = tokens[start..end].join(" ");
                    self.number(&phrase).map(|number| (end, phrase, number))
                });
            match matched {
                Some((end, phrase, number)) => {
                    start = end;
                    if number == REST_OF_LINE { break; }
                    if number != IGNORED_WORD {
                        result.push(ParsedWord{ text: phrase, number: Some(number) });
                    }
                },
                None => {
                    result.push(ParsedWord{ text: tokens[start].to_string(), number: None });
                    start += 1;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn entry(copy: u8, suffix: &str, number: u16) -> Vec<u8> {
        let mut out = vec![ copy ];
        let chars = suffix.as_bytes();
        for (n, ch) in chars.iter().enumerate() {
            let b = ch ^ 0x7f;
            out.push(if n + 1 == chars.len() { b | 0x80 } else { b });
        }
        out.extend_from_slice(&number.to_be_bytes());
        out
    }

    fn words_tok(entries: &[(u8, &str, u16)]) -> Vec<u8> {
        let mut data = vec![ 0u8; LETTER_INDEX_SIZE ];
        for (copy, suffix, number) in entries {
            data.extend(entry(*copy, suffix, *number));
        }
        data
    }

    #[test]
    fn apple_apricot() {
        let index = WordIndex::new(&words_tok(&[ (0, "apple", 5), (2, "ricot", 5) ])).unwrap();
        assert_eq!(index.number("apple"), Some(5));
        assert_eq!(index.number("apricot"), Some(5));
        let synonyms: Vec<&str> = index.synonyms(5).unwrap().iter().map(|s| s.as_str()).collect();
        assert_eq!(synonyms, vec![ "apple", "apricot" ]);
    }

    #[test]
    fn first_number_wins() {
        let index = WordIndex::new(&words_tok(&[ (0, "look", 20), (0, "look", 21), (2, "ng", 22) ])).unwrap();
        assert_eq!(index.number("look"), Some(20));
        assert!(index.synonyms(21).is_none());
        // the duplicate still serves as prefix source
        assert_eq!(index.number("long"), Some(22));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn zero_byte_ends_table() {
        let mut data = words_tok(&[ (0, "door", 30) ]);
        data.extend_from_slice(&[ 0x00, 0x00, 0x12 ]);
        let index = WordIndex::new(&data).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.words().next(), Some(Word{ text: "door".to_string(), number: 30 }));
    }

    #[test]
    fn malformed_tables() {
        assert!(WordIndex::new(&[ 0u8; 10 ]).is_err());
        assert!(WordIndex::new(&words_tok(&[ (3, "abc", 1) ])).is_err());
        assert!(WordIndex::new(&words_tok(&[ (0, "ab", 1), (5, "c", 1) ])).is_err());
        let mut truncated = words_tok(&[ (0, "ab", 1) ]);
        truncated.pop();
        assert!(WordIndex::new(&truncated).is_err());
    }

    #[test]
    fn parse_input() {
        let index = WordIndex::new(&words_tok(&[
            (0, "the", IGNORED_WORD),
            (0, "pick", 40),
            (4, " up", 41),
            (0, "rol", REST_OF_LINE),
            (0, "rock", 50),
        ])).unwrap();
        let parsed = index.parse("  Pick UP   the rock xyzzy rock rol rock ");
        assert_eq!(parsed, vec![
            ParsedWord{ text: "pick up".to_string(), number: Some(41) },
            ParsedWord{ text: "rock".to_string(), number: Some(50) },
            ParsedWord{ text: "xyzzy".to_string(), number: None },
            ParsedWord{ text: "rock".to_string(), number: Some(50) },
        ]);
        assert_eq!(index.parse("pick")[0].number, Some(40));
        assert!(index.parse("").is_empty());
    }
}
