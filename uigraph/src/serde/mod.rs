mod flatbuffers;
