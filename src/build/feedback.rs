use colored::*;

/// Turns raw tool output into a hint about the likely cause.
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Target not supported by the sources
        if output.contains("[NOT_SUPPORTED]") {
            return Some(format!(
                "A source file rejected this target with {}.\nPick another target or exclude the sources with an {} file.",
                "#error [NOT_SUPPORTED]".bold().yellow(),
                ".xfignore".bold().green()
            ));
        }

        // 2. Memory region overflow (Linker Error)
        if output.contains("will not fit in region") || output.contains("region `") && output.contains("overflowed by") {
            return Some(format!(
                "The image does not fit in the {}.\nTry {} or drop unused features from {}.",
                "target memory".bold().red(),
                "--small-build".bold().green(),
                "xf_app.json".bold().yellow()
            ));
        }

        // 3. Missing linker script
        if output.contains("cannot open linker script file")
            || output.contains("could not open scatter description")
            || output.contains("could not open file") && output.contains(".icf")
        {
            return Some(format!(
                "The {} could not be opened.\nCheck that a TARGET_ directory for this board provides one, or pass {}.",
                "linker script".bold().red(),
                "--linker-script".bold().green()
            ));
        }

        // 4. Undefined symbol (Linker Error)
        if output.contains("undefined reference to") || output.contains("Undefined symbol") {
            return Some(format!(
                "It looks like a {} error.\nA source or library may be filtered out for this target or toolchain.\nRun {} to see what the scan picked up.",
                "Linker".bold().red(),
                "xf scan".bold().green()
            ));
        }

        // 5. Missing Header (Compiler Error)
        if output.contains("fatal error: ") && output.contains("No such file or directory")
            || output.contains("cannot open source input file")
            || output.contains("could not open source file")
        {
            return Some(format!(
                "It looks like a {} error.\nThe directory holding it may be hidden by a label or an ignore rule.\nCheck the {} and {} directories in the source tree.",
                "Missing Header".bold().red(),
                "TARGET_".bold().yellow(),
                "FEATURE_".bold().yellow()
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linker_error() {
        let err = "main.o: In function `main':\nmain.c:(.text+0x8): undefined reference to `uart_init'";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("Linker"));
        assert!(msg.contains("xf scan"));
    }

    #[test]
    fn test_include_error() {
        let err = "main.c:1:10: fatal error: board.h: No such file or directory";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("Missing Header"));
    }

    #[test]
    fn test_region_overflow() {
        let err = "ld: region `FLASH' overflowed by 1024 bytes";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("target memory"));
    }

    #[test]
    fn test_missing_linker_script() {
        let err = "ld: cannot open linker script file K64F.ld: No such file or directory";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("linker script"));
    }

    #[test]
    fn test_unknown_output() {
        assert!(FeedbackAnalyzer::analyze("main.c:3: warning: unused").is_none());
    }
}
