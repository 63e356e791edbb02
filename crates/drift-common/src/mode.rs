//! Textual rendering of Unix file modes.
//!
//! Produces the familiar `ls -l` form (`drwxr-xr-x`, `-rw-r--r--`) from a
//! raw `st_mode`, including setuid/setgid/sticky markers. Snapshots store
//! the textual form so mode drift reads naturally in reports.

/// File type character from the `st_mode` type bits.
fn type_char(mode: u32) -> char {
    match mode & 0o170000 {
        0o040000 => 'd',
        0o120000 => 'l',
        0o140000 => 's',
        0o060000 => 'b',
        0o020000 => 'c',
        0o010000 => 'p',
        _ => '-',
    }
}

/// Format a raw `st_mode` as a ten-character mode string.
pub fn mode_string(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(type_char(mode));

    let triads = [(mode >> 6) & 0o7, (mode >> 3) & 0o7, mode & 0o7];
    for (i, bits) in triads.iter().enumerate() {
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });

        let execute = bits & 0o1 != 0;
        let special = match i {
            0 => mode & 0o4000 != 0, // setuid
            1 => mode & 0o2000 != 0, // setgid
            _ => mode & 0o1000 != 0, // sticky
        };
        out.push(match (special, execute, i) {
            (true, true, 2) => 't',
            (true, false, 2) => 'T',
            (true, true, _) => 's',
            (true, false, _) => 'S',
            (false, true, _) => 'x',
            (false, false, _) => '-',
        });
    }

    out
}
