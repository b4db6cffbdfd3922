//! Small synthetic CFF fonts for tests.

use super::dict::{op, patch_placeholder, write_fixed_integer, write_integer, write_operator, write_placeholder};
use super::index::write_index;

/// `defaultWidthX`
const DEFAULT_WIDTH_X: u16 = 20;

struct Layout<'a> {
    cid: bool,
    charstrings: &'a [Vec<u8>],
    charset: &'a [u16],
    global_subrs: &'a [Vec<u8>],
    /// One list of local subroutines per Private DICT
    local_subrs: &'a [Vec<Vec<u8>>],
    encoding: Option<&'a [u8]>,
    fd_select: &'a [u8],
}

/// Private DICT followed by its local subroutines; returns the DICT size.
fn private_dict(out: &mut Vec<u8>, subrs: &[Vec<u8>]) -> usize {
    let mut dict = Vec::new();
    write_integer(&mut dict, 500);
    write_operator(&mut dict, DEFAULT_WIDTH_X);
    let subrs_position = write_placeholder(&mut dict);
    write_operator(&mut dict, op::SUBRS);
    let size = dict.len();
    patch_placeholder(&mut dict, subrs_position, size as i32);
    out.extend(dict);
    write_index(out, subrs).unwrap();
    size
}

fn build(layout: Layout<'_>) -> Vec<u8> {
    let mut out: Vec<u8> = vec![1, 0, 4, 4];
    write_index(&mut out, &[b"TestFont".as_slice()]).unwrap();

    let mut top = Vec::new();
    if layout.cid {
        for operand in [391, 392, 0] {
            write_integer(&mut top, operand);
        }
        write_operator(&mut top, op::ROS);
    }
    let charset = write_placeholder(&mut top);
    write_operator(&mut top, op::CHARSET);
    let char_strings = write_placeholder(&mut top);
    write_operator(&mut top, op::CHAR_STRINGS);
    let encoding = layout.encoding.map(|_| {
        let position = write_placeholder(&mut top);
        write_operator(&mut top, op::ENCODING);
        position
    });
    let (private, fd_array, fd_select) = if layout.cid {
        let fd_array = write_placeholder(&mut top);
        write_operator(&mut top, op::FD_ARRAY);
        let fd_select = write_placeholder(&mut top);
        write_operator(&mut top, op::FD_SELECT);
        (None, Some(fd_array), Some(fd_select))
    } else {
        let private = write_placeholder(&mut top);
        write_placeholder(&mut top);
        write_operator(&mut top, op::PRIVATE);
        (Some(private), None, None)
    };
    write_index(&mut out, &[&top]).unwrap();
    let top_start = out.len() - top.len();

    let strings: Vec<&[u8]> = if layout.cid { vec![b"Adobe".as_slice(), b"Identity".as_slice()] } else { Vec::new() };
    write_index(&mut out, &strings).unwrap();
    write_index(&mut out, layout.global_subrs).unwrap();

    let charset_position = out.len();
    out.push(0);
    for sid in layout.charset {
        out.extend_from_slice(&sid.to_be_bytes());
    }

    let encoding_position = out.len();
    if let Some(encoding) = layout.encoding {
        out.extend_from_slice(encoding);
    }

    let char_strings_position = out.len();
    write_index(&mut out, layout.charstrings).unwrap();

    let mut patches = vec![
        (charset, charset_position),
        (char_strings, char_strings_position),
    ];
    if let Some(position) = encoding {
        patches.push((position, encoding_position));
    }

    if let Some(position) = private {
        let offset = out.len();
        let size = private_dict(&mut out, &layout.local_subrs[0]);
        patches.push((position, size));
        patches.push((position + 5, offset));
    }

    if let (Some(fd_array), Some(fd_select)) = (fd_array, fd_select) {
        let mut font_dicts = Vec::new();
        for subrs in layout.local_subrs {
            let offset = out.len();
            let size = private_dict(&mut out, subrs);
            let mut dict = Vec::new();
            write_fixed_integer(&mut dict, size as i32);
            write_fixed_integer(&mut dict, offset as i32);
            write_operator(&mut dict, op::PRIVATE);
            font_dicts.push(dict);
        }
        patches.push((fd_array, out.len()));
        write_index(&mut out, &font_dicts).unwrap();

        patches.push((fd_select, out.len()));
        out.push(0);
        out.extend_from_slice(layout.fd_select);
    }

    for (position, value) in patches {
        patch_placeholder(&mut out, top_start + position, value as i32);
    }
    out
}

/// Six glyphs: `.notdef`, `A` (local subroutine), `grave` (hint mask),
/// `Agrave` (accented `A` + `grave`), `B` (global subroutine) and `C`.
/// Custom encoding with a supplement mapping code 97 to `A`.
pub(crate) fn simple_font() -> Vec<u8> {
    build(Layout {
        cid: false,
        charstrings: &[
            vec![14],
            vec![239, 239, 21, 32, 10, 14],
            vec![139, 149, 1, 19, 0x80, 14],
            vec![139, 139, 204, 247, 85, 14],
            vec![32, 29, 14],
            vec![139, 139, 21, 14],
        ],
        charset: &[34, 124, 174, 35, 36],
        global_subrs: &[vec![239, 239, 21, 11]],
        local_subrs: &[vec![vec![189, 189, 5, 11]]],
        encoding: Some([0x80, 5, 65, 193, 200, 66, 67, 1, 97, 0, 34].as_slice()),
        fd_select: &[],
    })
}

/// CID keyed font with four glyphs and two font DICTs; glyph 2 uses font
/// DICT 0, the others font DICT 1. Every glyph but `.notdef` calls local
/// subroutine 0 of its font DICT.
pub(crate) fn cid_font() -> Vec<u8> {
    build(Layout {
        cid: true,
        charstrings: &[vec![14], vec![32, 10, 14], vec![32, 10, 14], vec![32, 10, 14]],
        charset: &[1, 2, 3],
        global_subrs: &[],
        local_subrs: &[vec![vec![189, 189, 5, 11]], vec![vec![149, 149, 5, 11]]],
        encoding: None,
        fd_select: &[1, 1, 0, 1],
    })
}
