// jbig2enc command line: lossless bitmap -> JBIG2 stream on stdout

use std::path::Path;

use super::ToolInvocation;

/// Build the `jbig2 <bitmap>` call, capturing its stdout into `output`.
pub fn compress_invocation(program: &str, bitmap: &Path, output: &Path) -> ToolInvocation {
    ToolInvocation::new(program).arg(bitmap).stdout_to(output)
}
