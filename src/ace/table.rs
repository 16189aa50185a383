use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::sync::{Arc, Mutex};

use log::debug;
use once_cell::sync::Lazy;

use crate::ace::blocks::{Block, BlockType};
use crate::ace::{JXS_SIZE, NXS_SIZE};
use crate::error::HeliosError;

// Tables already read from disk, keyed by path. Post-setup readers share
// the parsed tables immutably.
static ACE_TABLE_CACHE: Lazy<Mutex<HashMap<String, Arc<Vec<AceTable>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Drop every cached ACE file (tests use this to force re-reads).
pub fn clear_table_cache() {
    match ACE_TABLE_CACHE.lock() {
        Ok(mut cache) => cache.clear(),
        Err(poisoned) => poisoned.into_inner().clear(),
    }
}

/// Read every table of an ACE file, caching by path.
pub fn read_tables_cached(path: &str) -> Result<Arc<Vec<AceTable>>, HeliosError> {
    {
        let cache = match ACE_TABLE_CACHE.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tables) = cache.get(path) {
            return Ok(tables.clone());
        }
    }
    let text = fs::read_to_string(path)
        .map_err(|e| HeliosError::ace(0, format!("cannot read `{}`: {}", path, e)))?;
    let tables = Arc::new(AceTable::parse_all(&text)?);
    debug!("read {} ACE table(s) from `{}`", tables.len(), path);
    let mut cache = match ACE_TABLE_CACHE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    cache.insert(path.to_string(), tables.clone());
    Ok(tables)
}

/// One ACE table: header, NXS/JXS arrays and the typed blocks deserialized
/// from the payload. The payload itself is not kept; `reassemble` rebuilds
/// it from the blocks with freshly computed pointers.
#[derive(Clone, Debug, PartialEq)]
pub struct AceTable {
    pub zaid: String,
    /// Atomic weight ratio.
    pub awr: f64,
    /// Temperature in MeV, as stored on the table.
    pub temperature: f64,
    pub date: String,
    pub comment: String,
    /// Source identifiers (library / material line).
    pub source_info: String,
    pub nxs: [i64; NXS_SIZE],
    pub jxs: [i64; JXS_SIZE],
    pub blocks: Vec<Block>,
}

impl AceTable {
    /// Parse a single table from text; trailing content is an error.
    pub fn parse(text: &str) -> Result<Self, HeliosError> {
        let mut tables = Self::parse_all(text)?;
        match tables.len() {
            1 => Ok(tables.remove(0)),
            n => Err(HeliosError::ace(0, format!("expected one table, found {}", n))),
        }
    }

    /// Parse every table in a file's text.
    pub fn parse_all(text: &str) -> Result<Vec<AceTable>, HeliosError> {
        let mut lines: VecDeque<&str> = text.lines().collect();
        let mut tables = Vec::new();
        loop {
            // Skip blank separator lines between tables
            while matches!(lines.front(), Some(line) if line.trim().is_empty()) {
                lines.pop_front();
            }
            if lines.is_empty() {
                break;
            }
            tables.push(Self::parse_table(&mut lines)?);
        }
        if tables.is_empty() {
            return Err(HeliosError::ace(0, "empty ACE file"));
        }
        Ok(tables)
    }

    fn parse_table(lines: &mut VecDeque<&str>) -> Result<AceTable, HeliosError> {
        let header = lines
            .pop_front()
            .ok_or_else(|| HeliosError::ace(0, "missing table header line"))?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(HeliosError::ace(
                0,
                format!("header needs `zaid awr temperature date`, found `{}`", header),
            ));
        }
        let zaid = fields[0].to_string();
        let awr = parse_f64(fields[1])?;
        let temperature = parse_f64(fields[2])?;
        let date = fields[3].to_string();
        let comment = lines
            .pop_front()
            .ok_or_else(|| HeliosError::ace(0, "missing comment line"))?
            .trim()
            .to_string();
        let source_info = lines
            .pop_front()
            .ok_or_else(|| HeliosError::ace(0, "missing source-info line"))?
            .trim()
            .to_string();

        let mut numbers = NumberStream::new(lines);
        let mut nxs = [0i64; NXS_SIZE];
        for entry in nxs.iter_mut() {
            *entry = numbers.next_int()?;
        }
        let mut jxs = [0i64; JXS_SIZE];
        for entry in jxs.iter_mut() {
            *entry = numbers.next_int()?;
        }
        let payload_len = usize::try_from(nxs[0])
            .map_err(|_| HeliosError::ace(0, format!("negative payload length {}", nxs[0])))?;
        let mut xss = Vec::with_capacity(payload_len);
        for _ in 0..payload_len {
            xss.push(numbers.next_f64()?);
        }
        numbers.finish_line();

        let mut blocks = Vec::new();
        for block_type in BlockType::all() {
            if jxs[block_type.jxs_slot()] == 0 {
                continue;
            }
            blocks.push(Block::parse(block_type, &nxs, &jxs, &xss)?);
        }

        Ok(AceTable {
            zaid,
            awr,
            temperature,
            date,
            comment,
            source_info,
            nxs,
            jxs,
            blocks,
        })
    }

    /// The block of a given type, if present.
    pub fn block(&self, block_type: BlockType) -> Option<&Block> {
        self.blocks.iter().find(|b| b.block_type() == block_type)
    }

    /// Rebuild NXS/JXS/XSS from the blocks.
    ///
    /// Blocks dump in their original layout order (ascending old JXS
    /// pointer; slot order breaks ties); each block's starting index feeds
    /// the new JXS, and the payload length and energy-grid count in NXS are
    /// refreshed.
    pub fn reassemble(&self) -> ([i64; NXS_SIZE], [i64; JXS_SIZE], Vec<f64>) {
        let mut order: Vec<&Block> = self.blocks.iter().collect();
        order.sort_by_key(|b| {
            (
                self.jxs[b.block_type().jxs_slot()],
                b.block_type().jxs_slot(),
            )
        });

        let mut nxs = self.nxs;
        let mut jxs = [0i64; JXS_SIZE];
        let mut xss = Vec::new();
        for block in order {
            jxs[block.block_type().jxs_slot()] = xss.len() as i64 + 1;
            block.dump(&mut xss);
        }
        nxs[0] = xss.len() as i64;
        if let Some(Block::Esz(esz)) = self.block(BlockType::Esz) {
            nxs[2] = esz.energy.len() as i64;
        }
        (nxs, jxs, xss)
    }

    /// Re-layout in place: pointers and payload length follow the blocks.
    pub fn update_pointers(&mut self) {
        let (nxs, jxs, _) = self.reassemble();
        self.nxs = nxs;
        self.jxs = jxs;
    }

    /// Write the table as text. The output re-parses to an equal table.
    pub fn write(&self) -> String {
        let (nxs, jxs, xss) = self.reassemble();
        let mut out = String::new();
        // Default float formatting prints the shortest decimal that parses
        // back to the same value, keeping the round trip exact.
        let _ = writeln!(
            out,
            "{} {} {:e} {}",
            self.zaid, self.awr, self.temperature, self.date
        );
        let _ = writeln!(out, "{}", self.comment);
        let _ = writeln!(out, "{}", self.source_info);
        for chunk in nxs.chunks(8) {
            let words: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "{}", words.join(" "));
        }
        for chunk in jxs.chunks(8) {
            let words: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "{}", words.join(" "));
        }
        for chunk in xss.chunks(4) {
            let words: Vec<String> = chunk.iter().map(|v| format!("{:e}", v)).collect();
            let _ = writeln!(out, "{}", words.join(" "));
        }
        out
    }
}

fn parse_f64(token: &str) -> Result<f64, HeliosError> {
    token
        .parse::<f64>()
        .map_err(|_| HeliosError::ace(0, format!("malformed number `{}`", token)))
}

// Whitespace-separated numbers pulled across lines.
struct NumberStream<'a, 'b> {
    lines: &'a mut VecDeque<&'b str>,
    pending: VecDeque<String>,
    consumed: usize,
}

impl<'a, 'b> NumberStream<'a, 'b> {
    fn new(lines: &'a mut VecDeque<&'b str>) -> Self {
        NumberStream {
            lines,
            pending: VecDeque::new(),
            consumed: 0,
        }
    }

    fn next_token(&mut self) -> Result<String, HeliosError> {
        while self.pending.is_empty() {
            let line = self
                .lines
                .pop_front()
                .ok_or_else(|| HeliosError::ace(self.consumed, "unexpected end of table"))?;
            self.pending
                .extend(line.split_whitespace().map(str::to_string));
        }
        self.consumed += 1;
        Ok(self.pending.pop_front().expect("pending token"))
    }

    fn next_f64(&mut self) -> Result<f64, HeliosError> {
        let offset = self.consumed;
        let token = self.next_token()?;
        token
            .parse::<f64>()
            .map_err(|_| HeliosError::ace(offset, format!("malformed number `{}`", token)))
    }

    fn next_int(&mut self) -> Result<i64, HeliosError> {
        let offset = self.consumed;
        let token = self.next_token()?;
        token
            .parse::<i64>()
            .map_err(|_| HeliosError::ace(offset, format!("malformed integer `{}`", token)))
    }

    // Discard leftover tokens so the next table starts on a fresh line.
    fn finish_line(&mut self) {
        self.pending.clear();
    }
}
