use serde::Serialize;

use lotline_common::RejectStage;

/// Counters from one filter pipeline batch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub received: u32,
    pub invalid: u32,
    pub rejected_temporal: u32,
    pub rejected_keyword: u32,
    pub rejected_quality: u32,
    pub rejected_relevance: u32,
    pub rejected_geographic: u32,
    pub duplicates: u32,
    pub demoted: u32,
    pub accepted: u32,
}

impl FilterStats {
    pub(crate) fn bump_rejection(&mut self, stage: RejectStage) {
        match stage {
            RejectStage::Temporal => self.rejected_temporal += 1,
            RejectStage::Keyword => self.rejected_keyword += 1,
            RejectStage::Quality => self.rejected_quality += 1,
            RejectStage::Relevance => self.rejected_relevance += 1,
            RejectStage::Geographic => self.rejected_geographic += 1,
        }
    }

    pub fn rejected_total(&self) -> u32 {
        self.rejected_temporal
            + self.rejected_keyword
            + self.rejected_quality
            + self.rejected_relevance
            + self.rejected_geographic
    }
}

impl std::fmt::Display for FilterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Filter Batch Complete ===")?;
        writeln!(f, "Records received:   {}", self.received)?;
        writeln!(f, "Invalid records:    {}", self.invalid)?;
        writeln!(f, "\nRejections:")?;
        writeln!(f, "  temporal:   {}", self.rejected_temporal)?;
        writeln!(f, "  keyword:    {}", self.rejected_keyword)?;
        writeln!(f, "  quality:    {}", self.rejected_quality)?;
        writeln!(f, "  relevance:  {}", self.rejected_relevance)?;
        writeln!(f, "  geographic: {}", self.rejected_geographic)?;
        writeln!(f, "\nDuplicates:         {}", self.duplicates)?;
        writeln!(f, "Reps demoted:       {}", self.demoted)?;
        writeln!(f, "Accepted:           {}", self.accepted)?;
        let survivors = self.received.saturating_sub(self.invalid).max(1);
        writeln!(
            f,
            "Retention:          {:.0}%",
            self.accepted as f64 / survivors as f64 * 100.0
        )?;
        Ok(())
    }
}
