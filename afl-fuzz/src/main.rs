use exif_codec::{decode, encode, Edits};

fn main() {
    afl::fuzz!(|data: &[u8]| {
        let _ = decode(data);

        // a re-encoded image must decode again
        if let Ok(output) = encode(data, &Edits::new()) {
            let _ = decode(&output);
        }

        let mut edits = Edits::new();
        edits.set("Make", "fuzz").set("GPSLatitude", "-13.1631");
        if let Ok(output) = encode(data, &edits) {
            assert!(decode(&output).is_ok());
        }
    });
}
