use crate::error::HeliosError;

/// Read cursor over the XSS payload.
///
/// ACE pointers are 1-based; the cursor works in 0-based word offsets and
/// reports the failing offset in every error.
pub struct XssCursor<'a> {
    xss: &'a [f64],
    pos: usize,
}

impl<'a> XssCursor<'a> {
    pub fn new(xss: &'a [f64]) -> Self {
        XssCursor { xss, pos: 0 }
    }

    /// Position the cursor at a 1-based JXS pointer.
    pub fn seek(&mut self, jxs_pointer: i64) -> Result<(), HeliosError> {
        if jxs_pointer < 1 || jxs_pointer as usize > self.xss.len() {
            return Err(HeliosError::ace(
                0,
                format!(
                    "JXS pointer {} outside payload of {} words",
                    jxs_pointer,
                    self.xss.len()
                ),
            ));
        }
        self.pos = (jxs_pointer - 1) as usize;
        Ok(())
    }

    /// Current 0-based word offset.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn get(&mut self) -> Result<f64, HeliosError> {
        let value = self
            .xss
            .get(self.pos)
            .copied()
            .ok_or_else(|| HeliosError::ace(self.pos, "read past end of XSS"))?;
        self.pos += 1;
        Ok(value)
    }

    /// Read a word that must hold an integral value.
    pub fn get_int(&mut self) -> Result<i64, HeliosError> {
        let offset = self.pos;
        let value = self.get()?;
        if value.fract() != 0.0 {
            return Err(HeliosError::ace(
                offset,
                format!("expected integer word, found {}", value),
            ));
        }
        Ok(value as i64)
    }

    /// Read a count word that must be a non-negative integer.
    pub fn get_count(&mut self) -> Result<usize, HeliosError> {
        let offset = self.pos;
        let value = self.get_int()?;
        usize::try_from(value)
            .map_err(|_| HeliosError::ace(offset, format!("negative count {}", value)))
    }

    pub fn get_vec(&mut self, n: usize) -> Result<Vec<f64>, HeliosError> {
        if self.pos + n > self.xss.len() {
            return Err(HeliosError::ace(
                self.pos,
                format!("array of {} words runs past end of XSS", n),
            ));
        }
        let slice = self.xss[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(slice)
    }
}

/// Propagate a block size change through the JXS array: every pointer that
/// lay after this block in the original layout shifts by the block's size.
pub fn shift_jxs_array(jxs_old: &[i64; 32], jxs_new: &mut [i64; 32], slot: usize, size: i64) {
    let anchor = jxs_old[slot];
    for j in 0..32 {
        if jxs_old[j] > anchor {
            jxs_new[j] += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads() {
        let xss = vec![3.0, 1.0, 2.0, 4.5];
        let mut cursor = XssCursor::new(&xss);
        assert_eq!(cursor.get_count().unwrap(), 3);
        assert_eq!(cursor.get_vec(2).unwrap(), vec![1.0, 2.0]);
        assert_eq!(cursor.get().unwrap(), 4.5);
        assert!(cursor.get().is_err());
    }

    #[test]
    fn test_cursor_seek_is_one_based() {
        let xss = vec![10.0, 20.0, 30.0];
        let mut cursor = XssCursor::new(&xss);
        cursor.seek(2).unwrap();
        assert_eq!(cursor.get().unwrap(), 20.0);
        assert!(cursor.seek(0).is_err());
        assert!(cursor.seek(4).is_err());
    }

    #[test]
    fn test_non_integer_word_rejected() {
        let xss = vec![2.5];
        let mut cursor = XssCursor::new(&xss);
        let err = cursor.get_int().unwrap_err();
        assert!(matches!(err, HeliosError::AceParse { offset: 0, .. }));
    }

    #[test]
    fn test_shift_jxs_array() {
        let mut jxs_old = [0i64; 32];
        jxs_old[0] = 1;
        jxs_old[1] = 11;
        jxs_old[2] = 31;
        let mut jxs_new = jxs_old;
        // Block at slot 0 grows by 5 words: later pointers shift, absent
        // entries (0) stay put.
        shift_jxs_array(&jxs_old, &mut jxs_new, 0, 5);
        assert_eq!(jxs_new[0], 1);
        assert_eq!(jxs_new[1], 16);
        assert_eq!(jxs_new[2], 36);
        assert_eq!(jxs_new[3], 0);
    }
}
